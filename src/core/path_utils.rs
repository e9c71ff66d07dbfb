/*
 * Path helpers shared by the core: splitting listing paths into segments,
 * deriving normalized file extensions, and resolving the per-user application
 * configuration directory. Listing paths are always `/`-separated strings,
 * independent of the host platform, so none of the segment helpers use `Path`.
 */
use directories::ProjectDirs;
use std::fs;
use std::path::PathBuf;

/// Label used when a path segment is empty, e.g. for a leading `/`.
pub const ROOT_SEGMENT_LABEL: &str = "./";

/*
 * Splits a listing path into its non-empty segments.
 * A leading `/` (and any doubled separator) produces empty segments, which are
 * dropped. A path that is empty or consists only of separators yields an empty
 * vector; callers treat that as a malformed entry.
 */
pub fn split_path_segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|segment| !segment.is_empty()).collect()
}

/*
 * Returns the normalized extension of a file name: the text after the last dot,
 * normalized with `normalize_extension_key`. Names without a dot, and dot-files
 * such as `.gitignore` whose only dot is the leading one, have the empty
 * extension. The result is always a valid index key, so looking it up again
 * through `normalize_extension_key` finds the same group.
 */
pub fn extension_of(file_name: &str) -> String {
    match file_name.rfind('.') {
        Some(0) | None => String::new(),
        Some(idx) => normalize_extension_key(&file_name[idx + 1..]),
    }
}

/*
 * Normalizes an extension as typed by a user (`.RS`, `rs`, ` Rs `) to the key
 * used by the extension index.
 */
pub fn normalize_extension_key(extension: &str) -> String {
    extension.trim().trim_start_matches('.').to_lowercase()
}

/*
 * Retrieves the application's local configuration directory, creating it if
 * needed. Returns `None` if no suitable location can be determined or the
 * directory cannot be created.
 */
pub fn get_base_app_config_local_dir(app_name: &str) -> Option<PathBuf> {
    log::trace!("PathUtils: Resolving config dir for '{app_name}'");
    ProjectDirs::from("", "", app_name).and_then(|proj_dirs| {
        let config_path = proj_dirs.config_local_dir();
        if !config_path.exists() {
            if let Err(e) = fs::create_dir_all(config_path) {
                log::error!("PathUtils: Failed to create config directory {config_path:?}: {e}");
                return None;
            }
            log::debug!("PathUtils: Created config directory {config_path:?}");
        }
        Some(config_path.to_path_buf())
    })
}
