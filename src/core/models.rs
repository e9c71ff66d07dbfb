use serde::{Deserialize, Serialize};

/*
 * The kind of a listing entry. Only `File` entries become leaves of a `PathTree`;
 * directory markers and anything else a listing source reports are discarded,
 * since directories are inferred from the file paths themselves.
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryKind {
    File,
    Other,
}

/*
 * A single item of a flat listing, as produced by a listing collaborator.
 * The `locator` is opaque to the engine; it is only handed back to the
 * content-fetch collaborator when the file's text is needed.
 */
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub path: String,
    pub kind: EntryKind,
    pub size: u64,
    pub locator: String,
}

impl Entry {
    pub fn file(path: &str, size: u64, locator: &str) -> Self {
        Entry {
            path: path.to_string(),
            kind: EntryKind::File,
            size,
            locator: locator.to_string(),
        }
    }

    pub fn other(path: &str) -> Self {
        Entry {
            path: path.to_string(),
            kind: EntryKind::Other,
            size: 0,
            locator: String::new(),
        }
    }
}

/*
 * Tri-state selection value. Files only ever hold `Selected` or `Deselected`;
 * `Partial` is derived for directories and extension groups whose members disagree.
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SelectionState {
    Selected,
    #[default]
    Deselected,
    Partial,
}

impl SelectionState {
    /*
     * Folds member states into the derived state of a group.
     * An empty group is `Deselected`; otherwise the group is `Selected` or
     * `Deselected` only when every member agrees, and `Partial` in all other
     * cases (including any `Partial` member).
     */
    pub fn derive<I>(states: I) -> SelectionState
    where
        I: IntoIterator<Item = SelectionState>,
    {
        let mut derived: Option<SelectionState> = None;
        for state in states {
            match (derived, state) {
                (_, SelectionState::Partial) => return SelectionState::Partial,
                (None, s) => derived = Some(s),
                (Some(prev), s) if prev != s => return SelectionState::Partial,
                _ => {}
            }
        }
        derived.unwrap_or(SelectionState::Deselected)
    }

    /// The marker used when listing a tree as text.
    pub fn marker(self) -> &'static str {
        match self {
            SelectionState::Selected => "[x]",
            SelectionState::Deselected => "[ ]",
            SelectionState::Partial => "[~]",
        }
    }
}

/*
 * A value a user can set directly on a file, directory or extension group.
 * There is no partial value; `Partial` only ever comes out of derivation.
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckState {
    Checked,
    Unchecked,
}

impl From<CheckState> for SelectionState {
    fn from(value: CheckState) -> Self {
        match value {
            CheckState::Checked => SelectionState::Selected,
            CheckState::Unchecked => SelectionState::Deselected,
        }
    }
}

impl From<bool> for CheckState {
    fn from(value: bool) -> Self {
        if value {
            CheckState::Checked
        } else {
            CheckState::Unchecked
        }
    }
}

/*
 * A selected file as exported to the content-fetch collaborator (and,
 * downstream, to any archive exporter). `path` is root-relative without a
 * leading slash.
 */
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedFile {
    pub path: String,
    pub locator: String,
    pub size: u64,
}

/// A selected file together with its fetched text, ready for formatting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedContent {
    pub path: String,
    pub text: String,
}
