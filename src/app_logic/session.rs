/*
 * `PackSession` is the single logical actor that drives a pack: it owns the
 * current `PathTree`, applies the user's selection changes, exports the
 * selection, and renders it through the content-fetch and tokenizer
 * collaborators.
 *
 * Every loaded listing gets a new generation number. A `SelectionExport`
 * remembers the generation it came from, and `render` refuses exports from an
 * older listing, so nothing selected in a replaced tree can leak into a pack
 * built from the new one.
 */
use crate::core::content_fetch::fetch_all_contents;
use crate::core::formatter::render_document;
use crate::core::zip_archive::write_zip_file;
use crate::core::{
    ArchiveError, CheckState, ContentFetcherOperations, Entry, ExtensionPreferences,
    ListingError, ListingSourceOperations, PathTree, RenderError, RenderedDocument,
    SelectedContent, SelectedFile, SelectionError, SelectionSummary, TokenCounterOperations,
};
use std::path::Path;
use std::sync::Arc;

/// Selected files captured from one listing generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionExport {
    pub generation: u64,
    pub files: Vec<SelectedFile>,
}

pub struct PackSession {
    tree: PathTree,
    generation: u64,
    token_counter: Arc<dyn TokenCounterOperations>,
}

impl PackSession {
    /*
     * Creates a session with an empty listing (generation 0). The token
     * counter is used for every render in this session.
     */
    pub fn new(token_counter: Arc<dyn TokenCounterOperations>) -> Self {
        PackSession {
            tree: PathTree::build(Vec::new(), &ExtensionPreferences::new()),
            generation: 0,
            token_counter,
        }
    }

    pub fn tree(&self) -> &PathTree {
        &self.tree
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /*
     * Replaces the current tree with one built from `entries` and starts a new
     * generation. Returns the new generation number.
     */
    pub fn load_entries(&mut self, entries: Vec<Entry>, preferences: &ExtensionPreferences) -> u64 {
        self.tree = PathTree::build(entries, preferences);
        self.generation += 1;
        log::info!(
            "PackSession: Loaded listing #{} ({} files, {} bytes, {} malformed entries skipped)",
            self.generation,
            self.tree.selection_summary().total_files,
            self.tree.aggregate_size(self.tree.root()),
            self.tree.skipped_entries()
        );
        self.generation
    }

    /*
     * Loads a listing from a source. If the source fails, the current tree
     * and generation are left untouched.
     */
    pub fn load_from_source(
        &mut self,
        source: &dyn ListingSourceOperations,
        preferences: &ExtensionPreferences,
    ) -> Result<u64, ListingError> {
        let entries = source.list_entries()?;
        Ok(self.load_entries(entries, preferences))
    }

    pub fn toggle_path(&mut self, path: &str, value: CheckState) -> Result<(), SelectionError> {
        log::debug!("PackSession: Setting {path:?} to {value:?}");
        self.tree.set_path_selection(path, value)
    }

    pub fn toggle_extension(
        &mut self,
        extension: &str,
        value: CheckState,
    ) -> Result<(), SelectionError> {
        log::debug!("PackSession: Setting extension {extension:?} to {value:?}");
        self.tree.set_extension_selection(extension, value)
    }

    /*
     * Selects every file whose root-relative path matches `pattern`. Returns
     * the number of matching files.
     */
    pub fn select_matching(&mut self, pattern: &glob::Pattern) -> Result<usize, SelectionError> {
        let matching: Vec<_> = self
            .tree
            .files_in_display_order()
            .into_iter()
            .filter(|id| pattern.matches(&self.tree.path_of(*id)))
            .collect();
        self.tree.set_files_selection(&matching, CheckState::Checked)?;
        log::debug!(
            "PackSession: Pattern '{}' matched {} files",
            pattern.as_str(),
            matching.len()
        );
        Ok(matching.len())
    }

    /*
     * Replaces the whole selection with exactly `paths`, e.g. a list saved from
     * an earlier run. Returns how many files ended up selected.
     */
    pub fn restore_selection<'a, I>(&mut self, paths: I) -> usize
    where
        I: IntoIterator<Item = &'a str>,
    {
        let applied = self.tree.apply_selected_paths(paths);
        log::debug!("PackSession: Restored selection of {applied} files");
        applied
    }

    pub fn export_selection(&self) -> SelectionExport {
        SelectionExport {
            generation: self.generation,
            files: self.tree.selected_files(),
        }
    }

    pub fn summary(&self) -> SelectionSummary {
        self.tree.selection_summary()
    }

    /// Extension states for persistence; partially selected extensions are omitted.
    pub fn extension_preferences(&self) -> ExtensionPreferences {
        self.tree.extension_index().export_preferences()
    }

    // Staleness and emptiness checks shared by every consumer of an export.
    fn fetch_export(
        &self,
        export: &SelectionExport,
        fetcher: &dyn ContentFetcherOperations,
    ) -> Result<Vec<SelectedContent>, RenderError> {
        if export.generation != self.generation {
            log::warn!(
                "PackSession: Discarding selection from listing #{} (current #{})",
                export.generation,
                self.generation
            );
            return Err(RenderError::StaleSelection {
                exported: export.generation,
                current: self.generation,
            });
        }
        if export.files.is_empty() {
            return Err(RenderError::EmptySelection);
        }
        fetch_all_contents(fetcher, &export.files)
    }

    /*
     * Fetches the exported files' contents and renders the pack.
     *
     * Fails with `StaleSelection` if the export predates the current listing,
     * with `EmptySelection` if nothing was selected, and with
     * `ContentFetchFailure` if any file could not be fetched. A missing token
     * count is not a failure.
     */
    pub fn render(
        &self,
        export: &SelectionExport,
        fetcher: &dyn ContentFetcherOperations,
    ) -> Result<RenderedDocument, RenderError> {
        let contents = self.fetch_export(export, fetcher)?;
        let document = render_document(&contents, self.token_counter.as_ref())?;
        match document.token_count {
            Some(tokens) => log::info!(
                "PackSession: Rendered {} files, ~{} tokens, sha256 {}",
                contents.len(),
                tokens,
                document.checksum
            ),
            None => log::info!(
                "PackSession: Rendered {} files, sha256 {}",
                contents.len(),
                document.checksum
            ),
        }
        Ok(document)
    }

    /*
     * Fetches the exported files and writes them to a zip archive at
     * `destination` instead of rendering a text pack. Returns the number of
     * files written. Fails on the same conditions as `render`, plus archive
     * I/O errors.
     */
    pub fn export_archive(
        &self,
        export: &SelectionExport,
        fetcher: &dyn ContentFetcherOperations,
        destination: &Path,
    ) -> Result<usize, ArchiveError> {
        let contents = self.fetch_export(export, fetcher)?;
        write_zip_file(destination, &contents)?;
        log::info!(
            "PackSession: Exported {} files to {destination:?}",
            contents.len()
        );
        Ok(contents.len())
    }
}
