/*
 * This module consolidates the core, platform-agnostic logic of the application:
 * building a `PathTree` from a flat listing, keeping tri-state selection
 * consistent across directories and extension groups, and rendering the
 * selected files into a packed text document. It also holds the collaborators
 * at the engine's edges (listing sources, content fetching, tokenization and
 * settings), each behind an `...Operations` trait so they can be substituted.
 */
pub mod checksum_utils;
pub mod config;
pub mod content_fetch;
pub mod extension_index;
pub mod formatter;
pub mod listing;
pub mod models;
pub mod path_tree;
pub mod path_utils;
pub mod selection;
pub mod tokenizer_utils;
pub mod zip_archive;

// Re-export key structures and enums
pub use models::{CheckState, Entry, EntryKind, SelectedContent, SelectedFile, SelectionState};

pub use path_tree::{NodeId, PathTree, TreeNode};

pub use extension_index::{ExtensionIndex, ExtensionPreferences};

pub use selection::{SelectionError, SelectionSummary};

pub use formatter::{RenderError, RenderedDocument};

pub use content_fetch::{ContentFetcherOperations, LocalContentFetcher};

pub use listing::{JsonListingSource, ListingError, ListingSourceOperations, LocalDirectoryLister};

pub use config::{AppSettings, ConfigError, ConfigManagerOperations, CoreConfigManager};

pub use tokenizer_utils::{TokenCounterOperations, TokenizerKind};

pub use zip_archive::{ArchiveError, ZipContentFetcher, ZipListingSource};
