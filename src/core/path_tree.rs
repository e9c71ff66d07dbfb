/*
 * This module turns a flat listing of entries into a hierarchical `PathTree`.
 * The tree is an arena of `TreeNode`s addressed by `NodeId`; directories are
 * inferred from the path segments of file entries, so a listing never needs to
 * report them. The tree's shape is fixed once built: a new listing means a new
 * tree, and only selection state changes afterwards (see `selection.rs`).
 *
 * Aggregate sizes are computed on demand and memoized per directory, and the
 * presentation order of siblings (largest first, directories before files,
 * then by name) is derived at query time rather than stored.
 */
use super::extension_index::{ExtensionIndex, ExtensionPreferences};
use super::models::{Entry, EntryKind, SelectionState};
use super::path_utils;
use std::cell::OnceCell;
use std::cmp::Ordering;
use std::collections::HashMap;

/// Stable handle to a node of a `PathTree`. Only meaningful for the tree that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub(crate) fn from_index(index: usize) -> Self {
        NodeId(index)
    }

    pub(crate) fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug)]
pub struct DirectoryNode {
    pub(super) name: String,
    pub(super) parent: Option<NodeId>,
    pub(super) children: HashMap<String, NodeId>,
    pub(super) aggregate_size: OnceCell<u64>,
    pub(super) state: SelectionState,
}

#[derive(Debug)]
pub struct FileLeaf {
    pub(super) name: String,
    pub(super) parent: NodeId,
    pub(super) size: u64,
    pub(super) locator: String,
    pub(super) extension: String,
    pub(super) state: SelectionState,
}

impl FileLeaf {
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn locator(&self) -> &str {
        &self.locator
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }
}

#[derive(Debug)]
pub enum TreeNode {
    Directory(DirectoryNode),
    File(FileLeaf),
}

impl TreeNode {
    pub fn name(&self) -> &str {
        match self {
            TreeNode::Directory(dir) => &dir.name,
            TreeNode::File(file) => &file.name,
        }
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, TreeNode::Directory(_))
    }

    pub fn state(&self) -> SelectionState {
        match self {
            TreeNode::Directory(dir) => dir.state,
            TreeNode::File(file) => file.state,
        }
    }

    pub fn parent(&self) -> Option<NodeId> {
        match self {
            TreeNode::Directory(dir) => dir.parent,
            TreeNode::File(file) => Some(file.parent),
        }
    }
}

/*
 * The tree built from one listing, plus the extension index built in the same
 * pass. The root is always a directory with an empty name.
 */
#[derive(Debug)]
pub struct PathTree {
    pub(super) nodes: Vec<TreeNode>,
    pub(super) extensions: ExtensionIndex,
    skipped_entries: usize,
}

const ROOT: NodeId = NodeId(0);

impl PathTree {
    /*
     * Builds a tree from a sequence of entries.
     *
     * Entries that are not files are ignored. Entries whose path is empty or
     * root-only are malformed and skipped (counted in `skipped_entries`), as are
     * entries whose path would need an existing file to act as a directory.
     * When the same path occurs twice, the first entry wins and later ones are
     * dropped without error.
     *
     * `preferences` supplies the initial state per extension: an extension
     * mapped to `true` starts with all its files selected; everything else
     * starts deselected. Directory and extension states are derived before the
     * tree is returned.
     */
    pub fn build<I>(entries: I, preferences: &ExtensionPreferences) -> PathTree
    where
        I: IntoIterator<Item = Entry>,
    {
        let mut tree = PathTree {
            nodes: vec![TreeNode::Directory(DirectoryNode {
                name: String::new(),
                parent: None,
                children: HashMap::new(),
                aggregate_size: OnceCell::new(),
                state: SelectionState::Deselected,
            })],
            extensions: ExtensionIndex::new(),
            skipped_entries: 0,
        };
        let mut duplicates = 0usize;
        let preferences: ExtensionPreferences = preferences
            .iter()
            .map(|(ext, selected)| (path_utils::normalize_extension_key(ext), *selected))
            .collect();

        for entry in entries {
            if entry.kind != EntryKind::File {
                continue;
            }
            let segments = path_utils::split_path_segments(&entry.path);
            let Some((file_name, dir_segments)) = segments.split_last() else {
                log::warn!(
                    "PathTree: Skipping malformed entry with empty path {:?}",
                    entry.path
                );
                tree.skipped_entries += 1;
                continue;
            };

            let Some(parent) = tree.ensure_directories(dir_segments) else {
                log::warn!(
                    "PathTree: Skipping entry {:?}; a file already occupies one of its directories",
                    entry.path
                );
                tree.skipped_entries += 1;
                continue;
            };

            if tree.child(parent, file_name).is_some() {
                log::debug!("PathTree: Duplicate path {:?}; keeping first entry", entry.path);
                duplicates += 1;
                continue;
            }

            let extension = path_utils::extension_of(file_name);
            let state = if preferences.get(&extension).copied().unwrap_or(false) {
                SelectionState::Selected
            } else {
                SelectionState::Deselected
            };
            let id = tree.push_node(TreeNode::File(FileLeaf {
                name: file_name.to_string(),
                parent,
                size: entry.size,
                locator: entry.locator,
                extension: extension.clone(),
                state,
            }));
            tree.attach(parent, file_name, id);
            tree.extensions.register(&extension, id);
        }

        tree.rederive_all_directories();
        tree.rederive_all_extensions();
        log::debug!(
            "PathTree: Built tree with {} nodes, {} extensions ({} skipped, {} duplicates)",
            tree.nodes.len(),
            tree.extensions.len(),
            tree.skipped_entries,
            duplicates
        );
        tree
    }

    // Walks/creates the directory chain; None if a file sits where a directory is needed.
    fn ensure_directories(&mut self, segments: &[&str]) -> Option<NodeId> {
        let mut current = ROOT;
        for segment in segments {
            current = match self.child(current, segment) {
                Some(existing) if self.node(existing).is_dir() => existing,
                Some(_) => return None,
                None => {
                    let id = self.push_node(TreeNode::Directory(DirectoryNode {
                        name: segment.to_string(),
                        parent: Some(current),
                        children: HashMap::new(),
                        aggregate_size: OnceCell::new(),
                        state: SelectionState::Deselected,
                    }));
                    self.attach(current, segment, id);
                    id
                }
            };
        }
        Some(current)
    }

    fn push_node(&mut self, node: TreeNode) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    fn attach(&mut self, parent: NodeId, name: &str, child: NodeId) {
        if let TreeNode::Directory(dir) = &mut self.nodes[parent.0] {
            dir.children.insert(name.to_string(), child);
        }
    }

    pub fn root(&self) -> NodeId {
        ROOT
    }

    pub fn node(&self, id: NodeId) -> &TreeNode {
        &self.nodes[id.0]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children(ROOT).is_empty()
    }

    /// Number of malformed entries dropped while building.
    pub fn skipped_entries(&self) -> usize {
        self.skipped_entries
    }

    pub fn extension_index(&self) -> &ExtensionIndex {
        &self.extensions
    }

    pub fn state(&self, id: NodeId) -> SelectionState {
        self.node(id).state()
    }

    pub fn child(&self, dir: NodeId, name: &str) -> Option<NodeId> {
        match self.node(dir) {
            TreeNode::Directory(d) => d.children.get(name).copied(),
            TreeNode::File(_) => None,
        }
    }

    /// Children of a directory in unspecified order; empty for files.
    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        match self.node(id) {
            TreeNode::Directory(d) => d.children.values().copied().collect(),
            TreeNode::File(_) => Vec::new(),
        }
    }

    pub fn file(&self, id: NodeId) -> Option<&FileLeaf> {
        match self.node(id) {
            TreeNode::File(f) => Some(f),
            TreeNode::Directory(_) => None,
        }
    }

    /*
     * Aggregate size of a node: a file's own size, or the sum over a
     * directory's children. Directory sums are memoized, so each is computed
     * at most once per tree.
     */
    pub fn aggregate_size(&self, id: NodeId) -> u64 {
        match self.node(id) {
            TreeNode::File(f) => f.size,
            TreeNode::Directory(d) => *d.aggregate_size.get_or_init(|| {
                d.children
                    .values()
                    .map(|child| self.aggregate_size(*child))
                    .sum()
            }),
        }
    }

    /// Root-relative path of a node, `/`-separated and without a leading slash.
    pub fn path_of(&self, id: NodeId) -> String {
        let mut names = Vec::new();
        let mut current = Some(id);
        while let Some(node_id) = current {
            if node_id == ROOT {
                break;
            }
            let node = self.node(node_id);
            names.push(node.name());
            current = node.parent();
        }
        names.reverse();
        names.join("/")
    }

    /*
     * Resolves a listing path to a node. The root is found by an empty or
     * root-only path.
     */
    pub fn find(&self, path: &str) -> Option<NodeId> {
        path_utils::split_path_segments(path)
            .into_iter()
            .try_fold(ROOT, |current, segment| self.child(current, segment))
    }

    /*
     * Presentation order of siblings: aggregate size descending, then
     * directories before files, then case-sensitive name order.
     */
    pub fn compare_for_display(&self, a: NodeId, b: NodeId) -> Ordering {
        self.aggregate_size(b)
            .cmp(&self.aggregate_size(a))
            .then_with(|| self.node(b).is_dir().cmp(&self.node(a).is_dir()))
            .then_with(|| self.node(a).name().cmp(self.node(b).name()))
    }

    pub fn sorted_children(&self, id: NodeId) -> Vec<NodeId> {
        let mut children = self.children(id);
        children.sort_by(|a, b| self.compare_for_display(*a, *b));
        children
    }

    /// All file nodes in presentation order (depth-first over sorted children).
    pub fn files_in_display_order(&self) -> Vec<NodeId> {
        let mut files = Vec::new();
        let mut stack = vec![ROOT];
        while let Some(id) = stack.pop() {
            if self.node(id).is_dir() {
                for child in self.sorted_children(id).into_iter().rev() {
                    stack.push(child);
                }
            } else {
                files.push(id);
            }
        }
        files
    }

    /// Every file node underneath `id` (or `id` itself when it is a file).
    pub fn descendant_files(&self, id: NodeId) -> Vec<NodeId> {
        let mut files = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            match self.node(current) {
                TreeNode::File(_) => files.push(current),
                TreeNode::Directory(d) => stack.extend(d.children.values().copied()),
            }
        }
        files
    }

    /*
     * Renders the whole listing as indented text in presentation order, with a
     * selection marker and aggregate size on each line. Used for inspection
     * from the command line; not part of the packed output.
     */
    pub fn render_listing(&self) -> String {
        fn recurse(tree: &PathTree, id: NodeId, depth: usize, out: &mut String) {
            for child in tree.sorted_children(id) {
                let node = tree.node(child);
                let suffix = if node.is_dir() { "/" } else { "" };
                out.push_str(&format!(
                    "{}{} {}{} ({} B)\n",
                    "  ".repeat(depth),
                    node.state().marker(),
                    node.name(),
                    suffix,
                    tree.aggregate_size(child)
                ));
                if node.is_dir() {
                    recurse(tree, child, depth + 1, out);
                }
            }
        }

        let mut out = String::new();
        recurse(self, ROOT, 0, &mut out);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario_a_entries() -> Vec<Entry> {
        vec![
            Entry::file("/a/b.txt", 10, "loc-b"),
            Entry::file("/a/c.txt", 5, "loc-c"),
            Entry::file("/d.txt", 3, "loc-d"),
        ]
    }

    fn names(tree: &PathTree, ids: &[NodeId]) -> Vec<String> {
        ids.iter().map(|id| tree.node(*id).name().to_string()).collect()
    }

    #[test]
    fn test_scenario_a_sizes_and_root_order() {
        let tree = PathTree::build(scenario_a_entries(), &ExtensionPreferences::new());
        let a = tree.find("a").unwrap();
        assert_eq!(tree.aggregate_size(tree.root()), 18);
        assert_eq!(tree.aggregate_size(a), 15);
        assert_eq!(
            names(&tree, &tree.sorted_children(tree.root())),
            vec!["a", "d.txt"]
        );
    }

    #[test]
    fn test_empty_listing_produces_empty_root() {
        let tree = PathTree::build(Vec::new(), &ExtensionPreferences::new());
        assert!(tree.is_empty());
        assert_eq!(tree.aggregate_size(tree.root()), 0);
        assert_eq!(tree.state(tree.root()), SelectionState::Deselected);
        assert!(tree.extension_index().is_empty());
    }

    #[test]
    fn test_non_file_entries_are_ignored() {
        let entries = vec![Entry::other("a"), Entry::file("a/x.rs", 4, "x")];
        let tree = PathTree::build(entries, &ExtensionPreferences::new());
        assert_eq!(tree.len(), 3); // root, a, x.rs
        assert_eq!(tree.skipped_entries(), 0);
    }

    #[test]
    fn test_malformed_entries_are_skipped_and_counted() {
        let entries = vec![
            Entry::file("", 1, "empty"),
            Entry::file("/", 1, "root"),
            Entry::file("ok.txt", 2, "ok"),
        ];
        let tree = PathTree::build(entries, &ExtensionPreferences::new());
        assert_eq!(tree.skipped_entries(), 2);
        assert_eq!(tree.aggregate_size(tree.root()), 2);
    }

    #[test]
    fn test_file_blocking_directory_is_skipped() {
        let entries = vec![Entry::file("a", 1, "file-a"), Entry::file("a/b.txt", 2, "b")];
        let tree = PathTree::build(entries, &ExtensionPreferences::new());
        assert_eq!(tree.skipped_entries(), 1);
        assert!(!tree.node(tree.find("a").unwrap()).is_dir());
    }

    #[test]
    fn test_duplicate_path_keeps_first_entry() {
        let entries = vec![
            Entry::file("/a/b.txt", 10, "first"),
            Entry::file("a/b.txt", 99, "second"),
        ];
        let tree = PathTree::build(entries, &ExtensionPreferences::new());
        let b = tree.find("a/b.txt").unwrap();
        let leaf = tree.file(b).unwrap();
        assert_eq!(leaf.size(), 10);
        assert_eq!(leaf.locator(), "first");
        assert_eq!(tree.descendant_files(tree.root()).len(), 1);
        assert_eq!(tree.extension_index().members("txt").len(), 1);
    }

    #[test]
    fn test_build_is_deterministic_for_shuffled_input() {
        let mut entries = scenario_a_entries();
        entries.push(Entry::file("z/y/x.md", 15, "x"));
        entries.push(Entry::file("B.txt", 3, "B"));
        let forward = PathTree::build(entries.clone(), &ExtensionPreferences::new());
        entries.reverse();
        let reversed = PathTree::build(entries, &ExtensionPreferences::new());

        let paths = |tree: &PathTree| -> Vec<(String, u64)> {
            tree.files_in_display_order()
                .into_iter()
                .map(|id| (tree.path_of(id), tree.aggregate_size(id)))
                .collect()
        };
        assert_eq!(paths(&forward), paths(&reversed));
        assert_eq!(forward.render_listing(), reversed.render_listing());
    }

    #[test]
    fn test_sort_tie_breaks_directory_first_then_name() {
        let entries = vec![
            Entry::file("b.txt", 5, "b"),
            Entry::file("a.txt", 5, "a"),
            Entry::file("dir/inner.txt", 5, "i"),
            Entry::file("Z.txt", 5, "Z"),
        ];
        let tree = PathTree::build(entries, &ExtensionPreferences::new());
        assert_eq!(
            names(&tree, &tree.sorted_children(tree.root())),
            vec!["dir", "Z.txt", "a.txt", "b.txt"]
        );
    }

    #[test]
    fn test_path_of_and_find_round_trip() {
        let tree = PathTree::build(scenario_a_entries(), &ExtensionPreferences::new());
        let c = tree.find("/a/c.txt").unwrap();
        assert_eq!(tree.path_of(c), "a/c.txt");
        assert_eq!(tree.find(""), Some(tree.root()));
        assert_eq!(tree.find("a/missing.txt"), None);
        assert_eq!(tree.find("d.txt/deeper"), None);
    }

    #[test]
    fn test_extension_is_lower_cased() {
        let entries = vec![Entry::file("README.MD", 1, "r"), Entry::file("Makefile", 1, "m")];
        let tree = PathTree::build(entries, &ExtensionPreferences::new());
        let readme = tree.find("README.MD").unwrap();
        assert_eq!(tree.file(readme).unwrap().extension(), "md");
        assert_eq!(tree.extension_index().members("").len(), 1);
    }

    #[test]
    fn test_preferences_preselect_extensions() {
        let mut prefs = ExtensionPreferences::new();
        prefs.insert("txt".to_string(), true);
        prefs.insert("rs".to_string(), false);
        let mut entries = scenario_a_entries();
        entries.push(Entry::file("a/lib.rs", 1, "lib"));
        let tree = PathTree::build(entries, &prefs);

        assert_eq!(tree.state(tree.find("d.txt").unwrap()), SelectionState::Selected);
        assert_eq!(tree.state(tree.find("a/lib.rs").unwrap()), SelectionState::Deselected);
        assert_eq!(tree.state(tree.find("a").unwrap()), SelectionState::Partial);
        assert_eq!(tree.extension_index().state("txt"), Some(SelectionState::Selected));
    }

    #[test]
    fn test_render_listing_shows_markers_and_sizes() {
        let tree = PathTree::build(scenario_a_entries(), &ExtensionPreferences::new());
        let expected = concat!(
            "[ ] a/ (15 B)\n",
            "  [ ] b.txt (10 B)\n",
            "  [ ] c.txt (5 B)\n",
            "[ ] d.txt (3 B)\n",
        );
        assert_eq!(tree.render_listing(), expected);
    }
}
