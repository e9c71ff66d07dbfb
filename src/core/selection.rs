/*
 * Selection state transitions on a `PathTree`.
 *
 * Files hold the authoritative selection; directory and extension-group
 * states are derived from them:
 *  - a directory is Selected iff all its children are Selected, Deselected iff
 *    all are Deselected (or it has none), Partial otherwise;
 *  - an extension group follows the same rule over its member files.
 * Every public mutation re-derives the affected states before returning, and
 * debug builds verify the whole tree afterwards.
 */
use super::models::{CheckState, SelectedFile, SelectionState};
use super::path_tree::{NodeId, PathTree, TreeNode};
use super::path_utils;
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionError {
    UnknownPath(String),
    NotAFile(String),
    NotADirectory(String),
    UnknownExtension(String),
}

impl std::fmt::Display for SelectionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SelectionError::UnknownPath(p) => write!(f, "No such path in listing: {p}"),
            SelectionError::NotAFile(p) => write!(f, "Not a file: {p}"),
            SelectionError::NotADirectory(p) => write!(f, "Not a directory: {p}"),
            SelectionError::UnknownExtension(e) => {
                write!(f, "No files with extension '{e}' in listing")
            }
        }
    }
}

impl std::error::Error for SelectionError {}

pub type Result<T> = std::result::Result<T, SelectionError>;

/// Counts describing the current selection, for status display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SelectionSummary {
    pub total_files: usize,
    pub selected_files: usize,
    pub total_bytes: u64,
    pub selected_bytes: u64,
}

impl PathTree {
    /*
     * Sets a single file's state and re-derives its ancestors and its
     * extension group.
     */
    pub fn set_file_selection(&mut self, id: NodeId, value: CheckState) -> Result<()> {
        if self.node(id).is_dir() {
            return Err(SelectionError::NotAFile(self.path_of(id)));
        }
        if let TreeNode::File(file) = &mut self.nodes[id.index()] {
            file.state = value.into();
        }
        self.recompute_ancestors(id);
        self.debug_assert_consistent();
        Ok(())
    }

    /*
     * Cascades a value to every file below a directory, then re-derives the
     * directories inside the subtree, the directory's ancestors, and every
     * extension group touched.
     */
    pub fn set_directory_selection(&mut self, id: NodeId, value: CheckState) -> Result<()> {
        if !self.node(id).is_dir() {
            return Err(SelectionError::NotADirectory(self.path_of(id)));
        }
        let state: SelectionState = value.into();
        for file_id in self.descendant_files(id) {
            if let TreeNode::File(file) = &mut self.nodes[file_id.index()] {
                file.state = state;
            }
        }
        self.rederive_subtree(id);
        self.recompute_ancestors(id);
        self.debug_assert_consistent();
        Ok(())
    }

    /*
     * Sets every file of an extension group, wherever it is located, then
     * re-derives all directory states and the group's own state.
     */
    pub fn set_extension_selection(&mut self, extension: &str, value: CheckState) -> Result<()> {
        let key = path_utils::normalize_extension_key(extension);
        let members = match self.extensions.group(&key) {
            Some(group) => group.members().to_vec(),
            None => return Err(SelectionError::UnknownExtension(key)),
        };
        let state: SelectionState = value.into();
        for file_id in members {
            if let TreeNode::File(file) = &mut self.nodes[file_id.index()] {
                file.state = state;
            }
        }
        self.rederive_all_directories();
        self.rederive_extension(&key);
        self.debug_assert_consistent();
        Ok(())
    }

    /*
     * Sets many files at once and re-derives the whole tree a single time.
     * Directories among `ids` are rejected before anything changes.
     */
    pub fn set_files_selection(&mut self, ids: &[NodeId], value: CheckState) -> Result<()> {
        if let Some(dir_id) = ids.iter().find(|id| self.node(**id).is_dir()) {
            return Err(SelectionError::NotAFile(self.path_of(*dir_id)));
        }
        let state: SelectionState = value.into();
        for id in ids {
            if let TreeNode::File(file) = &mut self.nodes[id.index()] {
                file.state = state;
            }
        }
        self.rederive_all_directories();
        self.rederive_all_extensions();
        self.debug_assert_consistent();
        Ok(())
    }

    /*
     * Walks from the node's parent up to the root, re-deriving each directory
     * from its immediate children, then re-derives every extension group with
     * a file at or below the node.
     */
    pub fn recompute_ancestors(&mut self, id: NodeId) {
        let mut current = self.node(id).parent();
        while let Some(dir_id) = current {
            self.rederive_directory(dir_id);
            current = self.node(dir_id).parent();
        }

        let affected: BTreeSet<String> = self
            .descendant_files(id)
            .into_iter()
            .filter_map(|file_id| self.file(file_id).map(|f| f.extension().to_string()))
            .collect();
        for extension in affected {
            self.rederive_extension(&extension);
        }
    }

    /// Path-addressed convenience over the node-level setters.
    pub fn set_path_selection(&mut self, path: &str, value: CheckState) -> Result<()> {
        let id = self
            .find(path)
            .ok_or_else(|| SelectionError::UnknownPath(path.to_string()))?;
        if self.node(id).is_dir() {
            self.set_directory_selection(id, value)
        } else {
            self.set_file_selection(id, value)
        }
    }

    /*
     * Replaces the whole selection with exactly the given file paths. Paths not
     * present in the tree (or naming directories) are ignored; the number of
     * files actually selected is returned.
     */
    pub fn apply_selected_paths<'a, I>(&mut self, paths: I) -> usize
    where
        I: IntoIterator<Item = &'a str>,
    {
        let wanted: Vec<NodeId> = paths
            .into_iter()
            .filter_map(|p| self.find(p))
            .filter(|id| !self.node(*id).is_dir())
            .collect();
        for file_id in self.descendant_files(self.root()) {
            if let TreeNode::File(file) = &mut self.nodes[file_id.index()] {
                file.state = SelectionState::Deselected;
            }
        }
        let mut applied = 0;
        for file_id in wanted {
            if let TreeNode::File(file) = &mut self.nodes[file_id.index()] {
                if file.state != SelectionState::Selected {
                    file.state = SelectionState::Selected;
                    applied += 1;
                }
            }
        }
        self.rederive_all_directories();
        self.rederive_all_extensions();
        self.debug_assert_consistent();
        applied
    }

    /*
     * Exports the selected files (Selected only, never Partial) in
     * presentation order, as handed to the content-fetch collaborator.
     */
    pub fn selected_files(&self) -> Vec<SelectedFile> {
        self.files_in_display_order()
            .into_iter()
            .filter_map(|id| {
                let file = self.file(id)?;
                (file.state == SelectionState::Selected).then(|| SelectedFile {
                    path: self.path_of(id),
                    locator: file.locator().to_string(),
                    size: file.size(),
                })
            })
            .collect()
    }

    pub fn selection_summary(&self) -> SelectionSummary {
        let mut summary = SelectionSummary::default();
        for id in self.descendant_files(self.root()) {
            if let Some(file) = self.file(id) {
                summary.total_files += 1;
                summary.total_bytes += file.size();
                if file.state == SelectionState::Selected {
                    summary.selected_files += 1;
                    summary.selected_bytes += file.size();
                }
            }
        }
        summary
    }

    /*
     * Checks every derived state against a fresh derivation. Returns a
     * description of the first violation found.
     */
    pub fn verify_consistency(&self) -> std::result::Result<(), String> {
        for (idx, node) in self.nodes.iter().enumerate() {
            let id = NodeId::from_index(idx);
            match node {
                TreeNode::File(file) if file.state == SelectionState::Partial => {
                    return Err(format!("file {} is Partial", self.path_of(id)));
                }
                TreeNode::File(_) => {}
                TreeNode::Directory(dir) => {
                    let fresh = self.derive_directory(id);
                    if dir.state != fresh {
                        return Err(format!(
                            "directory '{}' is {:?}, expected {:?}",
                            self.path_of(id),
                            dir.state,
                            fresh
                        ));
                    }
                }
            }
        }

        for extension in self.extensions.extensions() {
            let enumerated: Vec<NodeId> = self
                .descendant_files(self.root())
                .into_iter()
                .filter(|id| self.file(*id).is_some_and(|f| f.extension() == extension))
                .collect();
            let fresh = SelectionState::derive(enumerated.iter().map(|id| self.state(*id)));
            let group = self.extensions.stored_group(extension);
            let cached = group.map(|g| g.state());
            if cached != Some(fresh) {
                return Err(format!(
                    "extension '{extension}' is {cached:?}, expected {fresh:?}"
                ));
            }
            if enumerated.len() != group.map_or(0, |g| g.members().len()) {
                return Err(format!("extension '{extension}' has stale membership"));
            }
        }
        Ok(())
    }

    fn debug_assert_consistent(&self) {
        if cfg!(debug_assertions) {
            if let Err(violation) = self.verify_consistency() {
                panic!("PathTree: selection invariant violated: {violation}");
            }
        }
    }

    fn derive_directory(&self, id: NodeId) -> SelectionState {
        SelectionState::derive(self.children(id).into_iter().map(|c| self.state(c)))
    }

    fn rederive_directory(&mut self, id: NodeId) {
        let derived = self.derive_directory(id);
        if let TreeNode::Directory(dir) = &mut self.nodes[id.index()] {
            dir.state = derived;
        }
    }

    // Post-order, so each directory sees its children's final states.
    fn rederive_subtree(&mut self, id: NodeId) {
        let mut order = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if self.node(current).is_dir() {
                order.push(current);
                stack.extend(self.children(current));
            }
        }
        for dir_id in order.into_iter().rev() {
            self.rederive_directory(dir_id);
        }
    }

    pub(super) fn rederive_all_directories(&mut self) {
        self.rederive_subtree(self.root());
    }

    fn rederive_extension(&mut self, extension: &str) {
        let Some(group) = self.extensions.stored_group(extension) else {
            return;
        };
        let derived = SelectionState::derive(group.members().iter().map(|id| self.state(*id)));
        self.extensions.set_state(extension, derived);
    }

    pub(super) fn rederive_all_extensions(&mut self) {
        let keys: Vec<String> = self
            .extensions
            .extensions()
            .into_iter()
            .map(str::to_string)
            .collect();
        for key in keys {
            self.rederive_extension(&key);
        }
    }
}
