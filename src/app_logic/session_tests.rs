use super::session::*;

use crate::core::{
    AppSettings, ArchiveError, CheckState, ContentFetcherOperations, Entry,
    ExtensionPreferences, JsonListingSource, ListingError, ListingSourceOperations,
    LocalContentFetcher, RenderError, SelectedFile, SelectionError, SelectionState,
    TokenCounterOperations, ZipContentFetcher, ZipListingSource,
};

use std::collections::HashMap;
use std::fs;
use std::io;
use std::sync::{Arc, Mutex};
use tempfile::tempdir;

/*
 * This module contains unit tests for `PackSession` from the `super::session`
 * module. Collaborators (listing source, content fetcher, tokenizer) are
 * replaced with mocks that return configured results and record their calls,
 * so the tests can observe exactly what the session asks of them.
 */

// --- Mock Structures (ListingSource, ContentFetcher, TokenCounter) ---
struct MockListingSource {
    result: Mutex<Option<Result<Vec<Entry>, ListingError>>>,
}

impl MockListingSource {
    fn returning(entries: Vec<Entry>) -> Self {
        MockListingSource {
            result: Mutex::new(Some(Ok(entries))),
        }
    }

    fn failing() -> Self {
        MockListingSource {
            result: Mutex::new(Some(Err(ListingError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                "mocked listing failure",
            ))))),
        }
    }
}

impl ListingSourceOperations for MockListingSource {
    fn list_entries(&self) -> Result<Vec<Entry>, ListingError> {
        self.result
            .lock()
            .unwrap()
            .take()
            .expect("MockListingSource called more than once")
    }
}

struct MockContentFetcher {
    texts: HashMap<String, String>,
    calls: Mutex<Vec<String>>,
}

impl MockContentFetcher {
    fn new(texts: &[(&str, &str)]) -> Self {
        MockContentFetcher {
            texts: texts
                .iter()
                .map(|(locator, text)| (locator.to_string(), text.to_string()))
                .collect(),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn get_calls(&self) -> Vec<String> {
        let mut calls = self.calls.lock().unwrap().clone();
        calls.sort();
        calls
    }
}

impl ContentFetcherOperations for MockContentFetcher {
    fn fetch_text(&self, file: &SelectedFile) -> io::Result<String> {
        self.calls.lock().unwrap().push(file.locator.clone());
        self.texts
            .get(&file.locator)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "mocked fetch failure"))
    }
}

struct MockTokenCounter {
    result: Option<usize>,
    calls: Mutex<usize>,
}

impl MockTokenCounter {
    fn new(result: Option<usize>) -> Self {
        MockTokenCounter {
            result,
            calls: Mutex::new(0),
        }
    }
}

impl TokenCounterOperations for MockTokenCounter {
    fn count_tokens(&self, _text: &str) -> Option<usize> {
        *self.calls.lock().unwrap() += 1;
        self.result
    }
}
// --- End Mock Structures ---

fn scenario_entries() -> Vec<Entry> {
    vec![
        Entry::file("/a/b.txt", 10, "loc-b"),
        Entry::file("/a/c.txt", 5, "loc-c"),
        Entry::file("/d.txt", 3, "loc-d"),
    ]
}

fn setup_session(token_result: Option<usize>) -> (PackSession, Arc<MockTokenCounter>) {
    let counter = Arc::new(MockTokenCounter::new(token_result));
    let mut session = PackSession::new(counter.clone());
    session.load_entries(scenario_entries(), &ExtensionPreferences::new());
    (session, counter)
}

#[test]
fn test_new_session_is_empty_generation_zero() {
    let session = PackSession::new(Arc::new(MockTokenCounter::new(None)));
    assert_eq!(session.generation(), 0);
    assert!(session.tree().is_empty());
    assert_eq!(
        session.tree().state(session.tree().root()),
        SelectionState::Deselected
    );
}

#[test]
fn test_render_selected_files_exact_document() {
    let (mut session, counter) = setup_session(Some(17));
    session.toggle_path("a/b.txt", CheckState::Checked).unwrap();
    session.toggle_path("d.txt", CheckState::Checked).unwrap();
    let fetcher = MockContentFetcher::new(&[("loc-b", "X"), ("loc-d", "Y")]);

    let export = session.export_selection();
    let document = session.render(&export, &fetcher).unwrap();

    assert_eq!(
        document.text,
        "Directory Structure:\n\n├── a\n│   └── b.txt\n└── d.txt\n\n---\nFile: a/b.txt\n---\n\nX\n\n---\nFile: d.txt\n---\n\nY\n"
    );
    assert_eq!(document.token_count, Some(17));
    assert_eq!(*counter.calls.lock().unwrap(), 1);
    assert_eq!(fetcher.get_calls(), vec!["loc-b", "loc-d"]);
}

#[test]
fn test_render_empty_selection_is_distinct_error() {
    let (session, counter) = setup_session(Some(1));
    let fetcher = MockContentFetcher::new(&[]);
    let result = session.render(&session.export_selection(), &fetcher);
    assert_eq!(result, Err(RenderError::EmptySelection));
    assert!(fetcher.get_calls().is_empty());
    assert_eq!(*counter.calls.lock().unwrap(), 0);
}

#[test]
fn test_render_fetch_failure_aborts_with_counts() {
    let (mut session, counter) = setup_session(Some(1));
    session.toggle_path("a", CheckState::Checked).unwrap();
    let fetcher = MockContentFetcher::new(&[("loc-b", "X")]);

    match session.render(&session.export_selection(), &fetcher) {
        Err(RenderError::ContentFetchFailure { failures, total }) => {
            assert_eq!(total, 2);
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].0, "a/c.txt");
        }
        other => panic!("Expected ContentFetchFailure, got {other:?}"),
    }
    assert_eq!(*counter.calls.lock().unwrap(), 0);
}

#[test]
fn test_render_without_tokenizer_omits_count() {
    let (mut session, _counter) = setup_session(None);
    session.toggle_path("d.txt", CheckState::Checked).unwrap();
    let fetcher = MockContentFetcher::new(&[("loc-d", "Y")]);
    let document = session
        .render(&session.export_selection(), &fetcher)
        .unwrap();
    assert_eq!(document.token_count, None);
    assert!(document.text.ends_with("File: d.txt\n---\n\nY\n"));
}

#[test]
fn test_render_is_byte_identical_across_runs() {
    let (mut session, _counter) = setup_session(Some(3));
    session.toggle_extension("txt", CheckState::Checked).unwrap();
    let fetcher = MockContentFetcher::new(&[("loc-b", "B"), ("loc-c", "C"), ("loc-d", "D")]);
    let first = session.render(&session.export_selection(), &fetcher).unwrap();
    let second = session.render(&session.export_selection(), &fetcher).unwrap();
    assert_eq!(first.text, second.text);
    assert_eq!(first.checksum, second.checksum);
}

#[test]
fn test_stale_export_is_rejected_after_reload() {
    let (mut session, _counter) = setup_session(Some(1));
    session.toggle_path("d.txt", CheckState::Checked).unwrap();
    let old_export = session.export_selection();
    assert_eq!(old_export.generation, 1);

    let new_generation = session.load_entries(scenario_entries(), &ExtensionPreferences::new());
    assert_eq!(new_generation, 2);
    let fetcher = MockContentFetcher::new(&[("loc-d", "Y")]);
    assert_eq!(
        session.render(&old_export, &fetcher),
        Err(RenderError::StaleSelection {
            exported: 1,
            current: 2
        })
    );
    assert!(fetcher.get_calls().is_empty());
    // The rebuilt tree starts from a clean selection.
    assert!(session.export_selection().files.is_empty());
}

#[test]
fn test_load_from_source_failure_keeps_current_tree() {
    let (mut session, _counter) = setup_session(Some(1));
    session.toggle_path("a", CheckState::Checked).unwrap();

    let result = session.load_from_source(&MockListingSource::failing(), &ExtensionPreferences::new());
    assert!(matches!(result, Err(ListingError::Io(_))));
    assert_eq!(session.generation(), 1);
    assert_eq!(session.export_selection().files.len(), 2);
}

#[test]
fn test_load_from_source_applies_preferences() {
    let mut session = PackSession::new(Arc::new(MockTokenCounter::new(None)));
    let source = MockListingSource::returning(vec![
        Entry::file("src/main.rs", 20, "main"),
        Entry::file("README.md", 4, "readme"),
        Entry::other("src"),
    ]);
    let prefs = ExtensionPreferences::from([("rs".to_string(), true), ("md".to_string(), false)]);

    let generation = session.load_from_source(&source, &prefs).unwrap();
    assert_eq!(generation, 1);
    let paths: Vec<String> = session
        .export_selection()
        .files
        .into_iter()
        .map(|f| f.path)
        .collect();
    assert_eq!(paths, vec!["src/main.rs"]);
    assert_eq!(session.extension_preferences(), prefs);
}

#[test]
fn test_select_matching_glob() {
    let (mut session, _counter) = setup_session(None);
    let pattern = glob::Pattern::new("a/*.txt").unwrap();
    assert_eq!(session.select_matching(&pattern).unwrap(), 2);
    assert_eq!(
        session.tree().state(session.tree().find("a").unwrap()),
        SelectionState::Selected
    );
    assert_eq!(
        session.tree().extension_index().state("txt"),
        Some(SelectionState::Partial)
    );
    let summary = session.summary();
    assert_eq!(summary.selected_files, 2);
    assert_eq!(summary.selected_bytes, 15);
}

#[test]
fn test_extension_preferences_omit_partial_groups() {
    let (mut session, _counter) = setup_session(None);
    session.toggle_path("d.txt", CheckState::Checked).unwrap();
    assert!(session.extension_preferences().get("txt").is_none());
    session.toggle_extension(".TXT", CheckState::Unchecked).unwrap();
    assert_eq!(session.extension_preferences().get("txt"), Some(&false));
}

#[test]
fn test_toggle_errors_surface_to_caller() {
    let (mut session, _counter) = setup_session(None);
    assert_eq!(
        session.toggle_path("missing.txt", CheckState::Checked),
        Err(SelectionError::UnknownPath("missing.txt".to_string()))
    );
    assert_eq!(
        session.toggle_extension("rs", CheckState::Checked),
        Err(SelectionError::UnknownExtension("rs".to_string()))
    );
}

#[test]
fn test_restore_selection_replaces_previous_state() {
    let (mut session, _counter) = setup_session(None);
    session.toggle_path("a", CheckState::Checked).unwrap();

    let applied = session.restore_selection(["d.txt", "a/c.txt", "a", "nope.txt"]);
    assert_eq!(applied, 2);
    let paths: Vec<String> = session
        .export_selection()
        .files
        .into_iter()
        .map(|f| f.path)
        .collect();
    assert_eq!(paths, vec!["a/c.txt", "d.txt"]);
    assert_eq!(
        session.tree().state(session.tree().find("a").unwrap()),
        SelectionState::Partial
    );
}

#[test]
fn test_git_tree_listing_renders_from_local_checkout() {
    let dir = tempdir().unwrap();
    fs::create_dir_all(dir.path().join("src")).unwrap();
    fs::write(dir.path().join("a.txt"), "alpha").unwrap();
    fs::write(dir.path().join("src/lib.rs"), "pub fn f() {}").unwrap();
    let listing_path = dir.path().join("listing.json");
    fs::write(
        &listing_path,
        r#"{"sha": "root", "tree": [
            {"path": "a.txt", "type": "blob", "size": 5, "sha": "b1",
             "url": "https://api.github.com/repos/o/r/git/blobs/b1"},
            {"path": "src", "type": "tree", "sha": "t1"},
            {"path": "src/lib.rs", "type": "blob", "size": 13, "sha": "b2",
             "url": "https://api.github.com/repos/o/r/git/blobs/b2"}
        ]}"#,
    )
    .unwrap();

    let mut session = PackSession::new(Arc::new(MockTokenCounter::new(None)));
    session
        .load_from_source(
            &JsonListingSource::new(listing_path),
            &ExtensionPreferences::new(),
        )
        .unwrap();
    session.toggle_path("a.txt", CheckState::Checked).unwrap();
    session.toggle_path("src", CheckState::Checked).unwrap();

    let fetcher = LocalContentFetcher::new(dir.path().to_path_buf());
    let document = session
        .render(&session.export_selection(), &fetcher)
        .unwrap();
    assert_eq!(
        document.text,
        "Directory Structure:\n\n├── src\n│   └── lib.rs\n└── a.txt\n\n---\nFile: src/lib.rs\n---\n\npub fn f() {}\n\n---\nFile: a.txt\n---\n\nalpha\n"
    );
}

#[test]
fn test_first_run_selects_default_extensions() {
    let mut session = PackSession::new(Arc::new(MockTokenCounter::new(None)));
    session.load_entries(
        vec![
            Entry::file("app/main.py", 30, "main.py"),
            Entry::file("web/index.html", 20, "index.html"),
            Entry::file("Cargo.lock", 500, "lock"),
            Entry::file("notes.txt", 2, "notes"),
        ],
        &AppSettings::default().effective_extension_preferences(),
    );
    let paths: Vec<String> = session
        .export_selection()
        .files
        .into_iter()
        .map(|f| f.path)
        .collect();
    assert_eq!(paths, vec!["app/main.py", "web/index.html"]);
    assert_eq!(
        session.tree().state(session.tree().root()),
        SelectionState::Partial
    );
}

#[test]
fn test_export_archive_from_zip_listing() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("input.zip");
    let first = crate::core::zip_archive::write_zip_archive(
        fs::File::create(&input).unwrap(),
        &[
            crate::core::SelectedContent {
                path: "src/main.rs".to_string(),
                text: "fn main() {}".to_string(),
            },
            crate::core::SelectedContent {
                path: "README.md".to_string(),
                text: "# hi".to_string(),
            },
        ],
    );
    assert!(first.is_ok());

    let mut session = PackSession::new(Arc::new(MockTokenCounter::new(Some(5))));
    session
        .load_from_source(&ZipListingSource::new(input.clone()), &ExtensionPreferences::new())
        .unwrap();
    session.toggle_extension("rs", CheckState::Checked).unwrap();
    let fetcher = ZipContentFetcher::new(input);
    let export = session.export_selection();

    let document = session.render(&export, &fetcher).unwrap();
    assert!(document.text.ends_with("File: src/main.rs\n---\n\nfn main() {}\n"));

    let output = dir.path().join("partial_repo.zip");
    assert_eq!(session.export_archive(&export, &fetcher, &output).unwrap(), 1);
    let exported = ZipListingSource::new(output.clone()).list_entries().unwrap();
    assert_eq!(exported, vec![Entry::file("src/main.rs", 12, "src/main.rs")]);

    session
        .load_from_source(&ZipListingSource::new(output.clone()), &ExtensionPreferences::new())
        .unwrap();
    assert!(matches!(
        session.export_archive(&export, &fetcher, &output),
        Err(ArchiveError::Render(RenderError::StaleSelection { .. }))
    ));
}
