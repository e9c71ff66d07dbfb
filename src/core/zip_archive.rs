/*
 * Zip archives at both ends of a pack: `ZipListingSource` and
 * `ZipContentFetcher` let a local `.zip` file stand in for a listing and its
 * contents, and `write_zip_archive` exports a fetched selection as a zip file
 * instead of a text pack. Members are addressed by their archive name, which
 * is also the entry's locator.
 */
use super::formatter::RenderError;
use super::listing::{ListingSourceOperations, Result as ListingResult};
use super::models::{Entry, EntryKind, SelectedContent, SelectedFile};
use super::content_fetch::ContentFetcherOperations;
use std::fs::File;
use std::io::{self, Read, Seek, Write};
use std::path::{Path, PathBuf};
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

#[derive(Debug)]
pub enum ArchiveError {
    Io(io::Error),
    Zip(ZipError),
    Render(RenderError),
}

impl From<io::Error> for ArchiveError {
    fn from(err: io::Error) -> Self {
        ArchiveError::Io(err)
    }
}

impl From<ZipError> for ArchiveError {
    fn from(err: ZipError) -> Self {
        ArchiveError::Zip(err)
    }
}

impl From<RenderError> for ArchiveError {
    fn from(err: RenderError) -> Self {
        ArchiveError::Render(err)
    }
}

impl std::fmt::Display for ArchiveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArchiveError::Io(e) => write!(f, "Archive I/O error: {e}"),
            ArchiveError::Zip(e) => write!(f, "Zip format error: {e}"),
            ArchiveError::Render(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for ArchiveError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ArchiveError::Io(e) => Some(e),
            ArchiveError::Zip(e) => Some(e),
            ArchiveError::Render(e) => Some(e),
        }
    }
}

pub type Result<T> = std::result::Result<T, ArchiveError>;

/*
 * Lists the file members of a zip archive. Directory members are skipped, as
 * are members whose names would escape the archive root (`../`, absolute
 * paths). Sizes are the uncompressed sizes.
 */
pub struct ZipListingSource {
    archive_path: PathBuf,
}

impl ZipListingSource {
    pub fn new(archive_path: PathBuf) -> Self {
        ZipListingSource { archive_path }
    }
}

impl ListingSourceOperations for ZipListingSource {
    fn list_entries(&self) -> ListingResult<Vec<Entry>> {
        log::debug!("ZipListingSource: Reading archive {:?}", self.archive_path);
        let mut archive = ZipArchive::new(File::open(&self.archive_path)?)?;
        let mut entries = Vec::with_capacity(archive.len());
        for idx in 0..archive.len() {
            let member = archive.by_index(idx)?;
            if member.is_dir() {
                continue;
            }
            if member.enclosed_name().is_none() {
                log::warn!("ZipListingSource: Skipping unsafe member name {:?}", member.name());
                continue;
            }
            entries.push(Entry {
                path: member.name().to_string(),
                kind: EntryKind::File,
                size: member.size(),
                locator: member.name().to_string(),
            });
        }
        log::debug!(
            "ZipListingSource: {} files in {:?}",
            entries.len(),
            self.archive_path
        );
        Ok(entries)
    }
}

/*
 * Reads member contents from a zip archive by locator. Each fetch opens its
 * own handle on the archive, so fetches can run on separate threads.
 */
pub struct ZipContentFetcher {
    archive_path: PathBuf,
}

impl ZipContentFetcher {
    pub fn new(archive_path: PathBuf) -> Self {
        ZipContentFetcher { archive_path }
    }
}

impl ContentFetcherOperations for ZipContentFetcher {
    fn fetch_text(&self, file: &SelectedFile) -> io::Result<String> {
        let mut archive = ZipArchive::new(File::open(&self.archive_path)?).map_err(zip_to_io)?;
        let mut member = archive.by_name(&file.locator).map_err(zip_to_io)?;
        let mut bytes = Vec::new();
        member.read_to_end(&mut bytes)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

fn zip_to_io(err: ZipError) -> io::Error {
    match err {
        ZipError::Io(e) => e,
        ZipError::FileNotFound => io::Error::new(io::ErrorKind::NotFound, "no such archive member"),
        other => io::Error::other(other),
    }
}

/*
 * Writes the given contents as a deflated zip, one member per file, named by
 * its listing path without a leading `/`. Returns the underlying writer.
 */
pub fn write_zip_archive<W: Write + Seek>(writer: W, contents: &[SelectedContent]) -> Result<W> {
    if contents.is_empty() {
        return Err(ArchiveError::Render(RenderError::EmptySelection));
    }
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut zip = ZipWriter::new(writer);
    for item in contents {
        zip.start_file(item.path.trim_start_matches('/'), options)?;
        zip.write_all(item.text.as_bytes())?;
    }
    Ok(zip.finish()?)
}

/// Creates (or truncates) `destination` and writes the zip there.
pub fn write_zip_file(destination: &Path, contents: &[SelectedContent]) -> Result<()> {
    let file = File::create(destination)?;
    write_zip_archive(file, contents)?;
    log::debug!(
        "ZipArchive: Wrote {} members to {destination:?}",
        contents.len()
    );
    Ok(())
}
