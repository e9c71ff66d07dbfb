/*
 * The content-fetch collaborator: turns exported `SelectedFile`s into text.
 * `ContentFetcherOperations` abstracts where the bytes come from; the local
 * implementation resolves each listing path relative to a root directory.
 *
 * `fetch_all_contents` fetches a batch on a bounded pool of scoped threads and
 * joins on all of it. The batch either succeeds completely or fails with every per-file error,
 * so a pack never silently drops a file that could not be read.
 */
use super::formatter::{RenderError, Result};
use super::models::{SelectedContent, SelectedFile};
use std::fs;
use std::io;
use std::path::PathBuf;
use std::thread;

pub trait ContentFetcherOperations: Send + Sync {
    fn fetch_text(&self, file: &SelectedFile) -> io::Result<String>;
}

/*
 * Reads file contents from a local directory. Files are resolved by their
 * listing path relative to `root`; the locator is left to sources whose
 * locators address something else (a blob URL, an archive member). Invalid
 * UTF-8 is replaced rather than rejected so binary-ish text files still pack.
 */
pub struct LocalContentFetcher {
    root: PathBuf,
}

impl LocalContentFetcher {
    pub fn new(root: PathBuf) -> Self {
        LocalContentFetcher { root }
    }
}

impl ContentFetcherOperations for LocalContentFetcher {
    fn fetch_text(&self, file: &SelectedFile) -> io::Result<String> {
        let relative = file.path.trim_start_matches('/');
        if relative.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "empty path for selected file",
            ));
        }
        let full_path = self.root.join(relative);
        log::trace!("LocalContentFetcher: Reading {full_path:?}");
        let bytes = fs::read(&full_path)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

const MAX_FETCH_WORKERS: usize = 16;

// Number of fetch workers for a batch: bounded by the host's parallelism.
fn fetch_worker_count(batch_len: usize) -> usize {
    let available = thread::available_parallelism().map_or(4, |n| n.get());
    available.clamp(1, MAX_FETCH_WORKERS).min(batch_len.max(1))
}

/*
 * Fetches every file on a bounded set of scoped worker threads and waits for
 * all of them. Each worker takes one contiguous chunk of the batch, so the
 * results come back in input order. If any fetch fails (or a worker cannot be
 * started, or panics), the whole batch fails with `ContentFetchFailure`
 * naming each failed path.
 */
pub fn fetch_all_contents(
    fetcher: &dyn ContentFetcherOperations,
    files: &[SelectedFile],
) -> Result<Vec<SelectedContent>> {
    if files.is_empty() {
        return Err(RenderError::EmptySelection);
    }
    let workers = fetch_worker_count(files.len());
    let chunk_size = files.len().div_ceil(workers);
    log::debug!(
        "ContentFetch: Fetching {} files on {} workers",
        files.len(),
        workers
    );

    let results: Vec<io::Result<String>> = thread::scope(|scope| {
        let handles: Vec<_> = files
            .chunks(chunk_size)
            .map(|chunk| {
                let spawned = thread::Builder::new()
                    .name("content-fetch".to_string())
                    .spawn_scoped(scope, move || {
                        chunk
                            .iter()
                            .map(|file| fetcher.fetch_text(file))
                            .collect::<Vec<_>>()
                    });
                (chunk.len(), spawned)
            })
            .collect();
        handles
            .into_iter()
            .flat_map(|(len, spawned)| match spawned {
                Ok(handle) => handle.join().unwrap_or_else(|_| {
                    (0..len)
                        .map(|_| Err(io::Error::other("fetch worker panicked")))
                        .collect()
                }),
                Err(e) => {
                    log::error!("ContentFetch: Could not start fetch worker: {e}");
                    (0..len)
                        .map(|_| Err(io::Error::other(format!("fetch worker not started: {e}"))))
                        .collect()
                }
            })
            .collect()
    });

    let mut contents = Vec::with_capacity(files.len());
    let mut failures = Vec::new();
    for (file, result) in files.iter().zip(results) {
        match result {
            Ok(text) => contents.push(SelectedContent {
                path: file.path.clone(),
                text,
            }),
            Err(e) => {
                log::warn!("ContentFetch: Failed to fetch {}: {e}", file.path);
                failures.push((file.path.clone(), e.to_string()));
            }
        }
    }

    if failures.is_empty() {
        Ok(contents)
    } else {
        Err(RenderError::ContentFetchFailure {
            failures,
            total: files.len(),
        })
    }
}
