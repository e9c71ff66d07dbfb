/*
 * Manages persisted application settings: the tokenizer choice, default
 * exclude patterns for local scans, the extensions selected on a first run,
 * and the per-extension selection preferences carried from one run to the
 * next. Settings are stored as JSON in the per-user local configuration
 * directory.
 *
 * `ConfigManagerOperations` abstracts the storage so that sessions and tests
 * can substitute their own; `CoreConfigManager` is the file-backed version.
 * Extension preferences leave this module as an explicit value handed to tree
 * construction; nothing deeper in the core reads settings on its own.
 */
use super::extension_index::ExtensionPreferences;
use super::path_utils;
use super::tokenizer_utils::TokenizerKind;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const SETTINGS_FILENAME: &str = "settings.json";

#[derive(Debug)]
pub enum ConfigError {
    Io(io::Error),
    Json(serde_json::Error),
    NoConfigDirectory,
}

impl From<io::Error> for ConfigError {
    fn from(err: io::Error) -> Self {
        ConfigError::Io(err)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::Json(err)
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "Configuration I/O error: {e}"),
            ConfigError::Json(e) => write!(f, "Configuration file format error: {e}"),
            ConfigError::NoConfigDirectory => {
                write!(f, "Could not determine configuration directory")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            ConfigError::Json(e) => Some(e),
            ConfigError::NoConfigDirectory => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ConfigError>;

// Extensions selected on first sight, until the user records a preference.
const DEFAULT_SELECTED_EXTENSIONS: &[&str] =
    &["js", "py", "java", "cpp", "html", "css", "ts", "jsx", "tsx"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub tokenizer: TokenizerKind,
    pub exclude_patterns: Vec<String>,
    pub default_selected_extensions: Vec<String>,
    pub extension_preferences: ExtensionPreferences,
}

impl Default for AppSettings {
    fn default() -> Self {
        AppSettings {
            tokenizer: TokenizerKind::default(),
            exclude_patterns: Vec::new(),
            default_selected_extensions: DEFAULT_SELECTED_EXTENSIONS
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
            extension_preferences: ExtensionPreferences::new(),
        }
    }
}

impl AppSettings {
    /*
     * The preferences a new tree is built with: every default extension maps
     * to `true`, and saved preferences override them key by key. Keys are
     * normalized, so `.JS` in the defaults and `js` in the saved map collide.
     */
    pub fn effective_extension_preferences(&self) -> ExtensionPreferences {
        let mut effective: ExtensionPreferences = self
            .default_selected_extensions
            .iter()
            .map(|ext| (path_utils::normalize_extension_key(ext), true))
            .collect();
        for (extension, selected) in &self.extension_preferences {
            effective.insert(path_utils::normalize_extension_key(extension), *selected);
        }
        effective
    }

    /*
     * Folds an extension-state export into the stored preferences. Extensions
     * absent from the export (partial, or not in the current listing) keep
     * their previous value.
     */
    pub fn merge_extension_preferences(&mut self, exported: &ExtensionPreferences) {
        for (extension, selected) in exported {
            self.extension_preferences
                .insert(extension.clone(), *selected);
        }
    }
}

pub trait ConfigManagerOperations: Send + Sync {
    fn load_settings(&self, app_name: &str) -> Result<AppSettings>;
    fn save_settings(&self, app_name: &str, settings: &AppSettings) -> Result<()>;
}

/*
 * File-backed settings storage. By default the file lives in the application's
 * local config directory; `with_settings_file` pins an explicit location.
 */
pub struct CoreConfigManager {
    settings_file_override: Option<PathBuf>,
}

impl CoreConfigManager {
    pub fn new() -> Self {
        CoreConfigManager {
            settings_file_override: None,
        }
    }

    pub fn with_settings_file(path: PathBuf) -> Self {
        CoreConfigManager {
            settings_file_override: Some(path),
        }
    }

    fn settings_path(&self, app_name: &str) -> Result<PathBuf> {
        if let Some(path) = &self.settings_file_override {
            return Ok(path.clone());
        }
        let config_dir = path_utils::get_base_app_config_local_dir(app_name)
            .ok_or(ConfigError::NoConfigDirectory)?;
        Ok(config_dir.join(SETTINGS_FILENAME))
    }
}

impl Default for CoreConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

fn read_settings_file(file_path: &Path) -> Result<AppSettings> {
    if !file_path.exists() {
        log::debug!("CoreConfigManager: Settings file {file_path:?} does not exist; using defaults.");
        return Ok(AppSettings::default());
    }
    let contents = fs::read_to_string(file_path)?;
    if contents.trim().is_empty() {
        log::debug!("CoreConfigManager: Settings file {file_path:?} is empty; using defaults.");
        return Ok(AppSettings::default());
    }
    let settings = serde_json::from_str(&contents)?;
    log::debug!("CoreConfigManager: Loaded settings from {file_path:?}.");
    Ok(settings)
}

impl ConfigManagerOperations for CoreConfigManager {
    fn load_settings(&self, app_name: &str) -> Result<AppSettings> {
        log::trace!("CoreConfigManager: Loading settings for app '{app_name}'");
        read_settings_file(&self.settings_path(app_name)?)
    }

    fn save_settings(&self, app_name: &str, settings: &AppSettings) -> Result<()> {
        let file_path = self.settings_path(app_name)?;
        if let Some(parent) = file_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(settings)?;
        fs::write(&file_path, json)?;
        log::debug!("CoreConfigManager: Saved settings for app '{app_name}' to {file_path:?}.");
        Ok(())
    }
}
