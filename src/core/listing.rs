/*
 * Listing collaborators: sources that produce the flat `Entry` sequence a
 * `PathTree` is built from. Two sources are provided here (zip archives are
 * listed by `zip_archive::ZipListingSource`):
 *  - `JsonListingSource` reads a listing document, either a git-tree style
 *    object (`{"tree": [...]}`) or a bare array of items;
 *  - `LocalDirectoryLister` walks a directory on disk with the `ignore` crate,
 *    so `.gitignore` rules and user exclude patterns are respected.
 * Neither source builds any hierarchy; that is the tree builder's job.
 */
use super::models::{Entry, EntryKind};
use ignore::{WalkBuilder, overrides::OverrideBuilder};
use serde::Deserialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub enum ListingError {
    Io(io::Error),
    Json(serde_json::Error),
    IgnoreError(ignore::Error),
    Archive(zip::result::ZipError),
    InvalidRoot(PathBuf),
}

impl From<io::Error> for ListingError {
    fn from(err: io::Error) -> Self {
        ListingError::Io(err)
    }
}

impl From<serde_json::Error> for ListingError {
    fn from(err: serde_json::Error) -> Self {
        ListingError::Json(err)
    }
}

impl From<ignore::Error> for ListingError {
    fn from(err: ignore::Error) -> Self {
        ListingError::IgnoreError(err)
    }
}

impl From<zip::result::ZipError> for ListingError {
    fn from(err: zip::result::ZipError) -> Self {
        ListingError::Archive(err)
    }
}

impl std::fmt::Display for ListingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ListingError::Io(e) => write!(f, "I/O error: {e}"),
            ListingError::Json(e) => write!(f, "Listing document error: {e}"),
            ListingError::IgnoreError(e) => write!(f, "Ignore pattern processing error: {e}"),
            ListingError::Archive(e) => write!(f, "Archive error: {e}"),
            ListingError::InvalidRoot(p) => write!(f, "Not a directory: {p:?}"),
        }
    }
}

impl std::error::Error for ListingError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ListingError::Io(e) => Some(e),
            ListingError::Json(e) => Some(e),
            ListingError::IgnoreError(e) => Some(e),
            ListingError::Archive(e) => Some(e),
            ListingError::InvalidRoot(_) => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ListingError>;

pub trait ListingSourceOperations {
    fn list_entries(&self) -> Result<Vec<Entry>>;
}

#[derive(Debug, Deserialize)]
struct RawListingItem {
    path: String,
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    size: Option<u64>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    sha: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawListing {
    Tree { tree: Vec<RawListingItem> },
    Items(Vec<RawListingItem>),
}

impl From<RawListingItem> for Entry {
    fn from(item: RawListingItem) -> Self {
        let kind = if item.kind == "blob" {
            EntryKind::File
        } else {
            EntryKind::Other
        };
        let locator = item.url.or(item.sha).unwrap_or_else(|| item.path.clone());
        Entry {
            path: item.path,
            kind,
            size: item.size.unwrap_or(0),
            locator,
        }
    }
}

/*
 * Parses a listing document. Items of type `blob` become file entries; every
 * other type is kept as `EntryKind::Other` for the tree builder to discard.
 * A missing size counts as zero; the locator is the item's `url`, else its
 * `sha`, else its path.
 */
pub fn parse_listing(document: &str) -> Result<Vec<Entry>> {
    let items = match serde_json::from_str::<RawListing>(document)? {
        RawListing::Tree { tree } => tree,
        RawListing::Items(items) => items,
    };
    Ok(items.into_iter().map(Entry::from).collect())
}

pub struct JsonListingSource {
    path: PathBuf,
}

impl JsonListingSource {
    pub fn new(path: PathBuf) -> Self {
        JsonListingSource { path }
    }
}

impl ListingSourceOperations for JsonListingSource {
    fn list_entries(&self) -> Result<Vec<Entry>> {
        log::debug!("JsonListingSource: Reading listing {:?}", self.path);
        let document = fs::read_to_string(&self.path)?;
        let entries = parse_listing(&document)?;
        log::debug!(
            "JsonListingSource: {} entries read from {:?}",
            entries.len(),
            self.path
        );
        Ok(entries)
    }
}

/*
 * Lists the files below a local directory. Paths are root-relative and
 * `/`-separated on every platform; the locator is the same relative path.
 * Standard ignore files are honored, hidden files are skipped, and
 * `exclude_patterns` are applied as gitignore-style overrides (a leading `!`
 * re-includes).
 */
pub struct LocalDirectoryLister {
    root: PathBuf,
    exclude_patterns: Vec<String>,
}

impl LocalDirectoryLister {
    pub fn new(root: PathBuf, exclude_patterns: Vec<String>) -> Self {
        LocalDirectoryLister {
            root,
            exclude_patterns,
        }
    }

    fn apply_exclude_patterns(&self, walker_builder: &mut WalkBuilder) {
        if self.exclude_patterns.is_empty() {
            return;
        }
        let mut override_builder = OverrideBuilder::new(&self.root);
        for pattern in &self.exclude_patterns {
            let trimmed = pattern.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let override_pattern = match trimmed.strip_prefix('!') {
                Some(include) if !include.trim().is_empty() => include.trim().to_string(),
                Some(_) => continue,
                None => format!("!{trimmed}"),
            };
            if let Err(err) = override_builder.add(&override_pattern) {
                log::warn!("LocalDirectoryLister: Invalid exclude pattern '{pattern}': {err}");
            }
        }
        match override_builder.build() {
            Ok(overrides) => {
                walker_builder.overrides(overrides);
            }
            Err(err) => {
                log::warn!("LocalDirectoryLister: Failed to build exclude overrides: {err}");
            }
        }
    }
}

fn relative_listing_path(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let segments: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if segments.is_empty() {
        None
    } else {
        Some(segments.join("/"))
    }
}

impl ListingSourceOperations for LocalDirectoryLister {
    fn list_entries(&self) -> Result<Vec<Entry>> {
        if !self.root.is_dir() {
            return Err(ListingError::InvalidRoot(self.root.clone()));
        }
        log::debug!("LocalDirectoryLister: Scanning {:?}", self.root);

        let mut walker_builder = WalkBuilder::new(&self.root);
        walker_builder
            .standard_filters(true)
            .parents(true)
            .git_global(false)
            .git_ignore(true)
            .git_exclude(true)
            .ignore(true)
            .hidden(true)
            .require_git(false)
            .sort_by_file_path(|a, b| a.cmp(b));
        self.apply_exclude_patterns(&mut walker_builder);

        let mut entries = Vec::new();
        for entry_result in walker_builder.build() {
            let entry = entry_result?;
            if !entry.file_type().is_some_and(|ft| ft.is_file()) {
                continue;
            }
            let Some(path) = relative_listing_path(&self.root, entry.path()) else {
                continue;
            };
            let size = match entry.metadata() {
                Ok(metadata) => metadata.len(),
                Err(e) => {
                    log::warn!("LocalDirectoryLister: No metadata for {path}: {e}");
                    0
                }
            };
            entries.push(Entry {
                locator: path.clone(),
                path,
                kind: EntryKind::File,
                size,
            });
        }
        log::debug!(
            "LocalDirectoryLister: Found {} files under {:?}",
            entries.len(),
            self.root
        );
        Ok(entries)
    }
}
