/*
 * Cross-cutting index from normalized file extension to every file node that
 * carries it, wherever the file sits in the tree. It is built in the same pass
 * as the `PathTree` and holds node identifiers rather than links, so file
 * nodes never point back at their group.
 *
 * Each group also caches its derived tri-state; `selection.rs` keeps it in
 * step with the tree after every mutation.
 */
use super::models::SelectionState;
use super::path_tree::NodeId;
use super::path_utils;
use std::collections::{BTreeMap, HashMap};

/*
 * Persisted per-extension selection preferences: extension (no dot, lower
 * case, empty string for extensionless files) to "select by default".
 */
pub type ExtensionPreferences = BTreeMap<String, bool>;

#[derive(Debug, Default)]
pub struct ExtensionGroup {
    members: Vec<NodeId>,
    state: SelectionState,
}

impl ExtensionGroup {
    pub fn members(&self) -> &[NodeId] {
        &self.members
    }

    pub fn state(&self) -> SelectionState {
        self.state
    }
}

#[derive(Debug, Default)]
pub struct ExtensionIndex {
    groups: HashMap<String, ExtensionGroup>,
}

impl ExtensionIndex {
    pub fn new() -> Self {
        ExtensionIndex {
            groups: HashMap::new(),
        }
    }

    pub(super) fn register(&mut self, extension: &str, id: NodeId) {
        self.groups
            .entry(extension.to_string())
            .or_default()
            .members
            .push(id);
    }

    pub(super) fn set_state(&mut self, extension: &str, state: SelectionState) {
        if let Some(group) = self.groups.get_mut(extension) {
            group.state = state;
        }
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Looks up a group; the key is normalized, so `.RS` finds `rs`.
    pub fn group(&self, extension: &str) -> Option<&ExtensionGroup> {
        self.groups
            .get(&path_utils::normalize_extension_key(extension))
    }

    // Exact-key lookup for keys already taken from the index.
    pub(super) fn stored_group(&self, key: &str) -> Option<&ExtensionGroup> {
        self.groups.get(key)
    }

    /// Members of an extension group; empty for an unknown extension.
    pub fn members(&self, extension: &str) -> &[NodeId] {
        self.group(extension).map(|g| g.members()).unwrap_or(&[])
    }

    pub fn state(&self, extension: &str) -> Option<SelectionState> {
        self.group(extension).map(|g| g.state())
    }

    /// All known extensions in ascending order.
    pub fn extensions(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.groups.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }

    /*
     * Exports the extension states for persistence. Fully selected and fully
     * deselected groups map to `true` and `false`; partially selected groups
     * have no boolean meaning and are left out.
     */
    pub fn export_preferences(&self) -> ExtensionPreferences {
        self.groups
            .iter()
            .filter_map(|(ext, group)| match group.state {
                SelectionState::Selected => Some((ext.clone(), true)),
                SelectionState::Deselected => Some((ext.clone(), false)),
                SelectionState::Partial => None,
            })
            .collect()
    }
}
