/*
 * Renders a set of selected files and their contents into the packed text
 * document: a "Directory Structure" index drawn with box-drawing connectors,
 * followed by one block per file. Rendering is a pure function of the
 * (path, text) pairs: the input order does not matter, since entries are
 * re-sorted with `compare_flat_paths` first, and the same input always yields
 * byte-identical output.
 *
 * Layout:
 *
 *   Directory Structure:
 *   <blank>
 *   ├── dir
 *   │   └── file1.txt
 *   └── file2.txt
 *   <blank>
 *   ---
 *   File: dir/file1.txt
 *   ---
 *   <blank>
 *   <content>
 *   <blank>
 *   ---
 *   ...
 *
 * Every file block ends with a newline after its content.
 */
use super::checksum_utils;
use super::models::SelectedContent;
use super::path_utils::ROOT_SEGMENT_LABEL;
use super::tokenizer_utils::TokenCounterOperations;
use std::cmp::Ordering;
use std::collections::HashMap;

const INDEX_HEADER: &str = "Directory Structure:\n\n";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    // Rendering was requested with nothing selected.
    EmptySelection,
    // One or more content fetches failed; every failure is listed.
    ContentFetchFailure {
        failures: Vec<(String, String)>,
        total: usize,
    },
    // The selection was exported from a listing that has since been replaced.
    StaleSelection { exported: u64, current: u64 },
}

impl std::fmt::Display for RenderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RenderError::EmptySelection => write!(f, "No files are selected"),
            RenderError::ContentFetchFailure { failures, total } => {
                write!(
                    f,
                    "Failed to fetch {} of {} selected files",
                    failures.len(),
                    total
                )?;
                for (path, message) in failures {
                    write!(f, "\n  {path}: {message}")?;
                }
                Ok(())
            }
            RenderError::StaleSelection { exported, current } => write!(
                f,
                "Selection belongs to listing #{exported}, but listing #{current} is loaded"
            ),
        }
    }
}

impl std::error::Error for RenderError {}

pub type Result<T> = std::result::Result<T, RenderError>;

/// A rendered pack with its approximate token count (if a tokenizer was available).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedDocument {
    pub text: String,
    pub token_count: Option<usize>,
    pub checksum: String,
}

/*
 * Order of flat file paths in the pack. Paths are compared segment by segment;
 * at the first depth where one path ends (a file) and the other continues (a
 * directory), the continuing path sorts first. Otherwise segments compare
 * lexically, case-sensitive.
 */
pub fn compare_flat_paths(a: &str, b: &str) -> Ordering {
    let a_segments: Vec<&str> = a.split('/').collect();
    let b_segments: Vec<&str> = b.split('/').collect();
    for (depth, (a_seg, b_seg)) in a_segments.iter().zip(b_segments.iter()).enumerate() {
        let a_is_file = depth + 1 == a_segments.len();
        let b_is_file = depth + 1 == b_segments.len();
        if a_is_file != b_is_file {
            return if a_is_file {
                Ordering::Greater
            } else {
                Ordering::Less
            };
        }
        match a_seg.cmp(b_seg) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    a_segments.len().cmp(&b_segments.len())
}

// Presence-only tree of the selected paths; children keep insertion order.
#[derive(Debug)]
enum IndexNode {
    File,
    Directory(IndexLevel),
}

#[derive(Debug, Default)]
struct IndexLevel {
    entries: Vec<(String, IndexNode)>,
    positions: HashMap<String, usize>,
}

impl IndexLevel {
    fn insert_path(&mut self, segments: &[&str]) {
        let Some((first, rest)) = segments.split_first() else {
            return;
        };
        let position = self.positions.get(*first).copied();
        if rest.is_empty() {
            if position.is_none() {
                self.push(first, IndexNode::File);
            }
            return;
        }
        let idx = match position {
            Some(idx) => idx,
            None => self.push(first, IndexNode::Directory(IndexLevel::default())),
        };
        match &mut self.entries[idx].1 {
            IndexNode::Directory(children) => children.insert_path(rest),
            IndexNode::File => {
                log::warn!("Formatter: '{first}' is both a file and a directory; keeping the file");
            }
        }
    }

    fn push(&mut self, name: &str, node: IndexNode) -> usize {
        let idx = self.entries.len();
        self.entries.push((name.to_string(), node));
        self.positions.insert(name.to_string(), idx);
        idx
    }

    fn render(&self, prefix: &str, out: &mut String) {
        for (idx, (name, node)) in self.entries.iter().enumerate() {
            let is_last = idx + 1 == self.entries.len();
            let connector = if is_last { "└── " } else { "├── " };
            let label = if name.is_empty() {
                ROOT_SEGMENT_LABEL
            } else {
                name.as_str()
            };
            out.push_str(prefix);
            out.push_str(connector);
            out.push_str(label);
            out.push('\n');
            if let IndexNode::Directory(children) = node {
                let continuation = if is_last { "    " } else { "│   " };
                children.render(&format!("{prefix}{continuation}"), out);
            }
        }
    }
}

/*
 * Renders the pack for the given contents. Fails with `EmptySelection` when
 * there is nothing to render.
 */
pub fn format_document(contents: &[SelectedContent]) -> Result<String> {
    if contents.is_empty() {
        return Err(RenderError::EmptySelection);
    }
    let mut sorted: Vec<&SelectedContent> = contents.iter().collect();
    sorted.sort_by(|a, b| compare_flat_paths(&a.path, &b.path));

    let mut index = IndexLevel::default();
    for item in &sorted {
        let segments: Vec<&str> = item.path.split('/').collect();
        index.insert_path(&segments);
    }

    let mut document = String::from(INDEX_HEADER);
    index.render("", &mut document);
    for item in &sorted {
        document.push_str("\n---\nFile: ");
        document.push_str(&item.path);
        document.push_str("\n---\n\n");
        document.push_str(&item.text);
        document.push('\n');
    }
    log::debug!(
        "Formatter: Rendered {} files into {} bytes",
        sorted.len(),
        document.len()
    );
    Ok(document)
}

/*
 * Renders the pack and annotates it with a token count and checksum. A
 * tokenizer that cannot produce a count leaves `token_count` empty; the
 * render itself still succeeds.
 */
pub fn render_document(
    contents: &[SelectedContent],
    token_counter: &dyn TokenCounterOperations,
) -> Result<RenderedDocument> {
    let text = format_document(contents)?;
    let token_count = token_counter.count_tokens(&text);
    if token_count.is_none() {
        log::warn!("Formatter: Tokenizer unavailable; omitting token count");
    }
    let checksum = checksum_utils::calculate_sha256_hex(text.as_bytes());
    Ok(RenderedDocument {
        text,
        token_count,
        checksum,
    })
}
