//! Configuration file support for the oxnav CLI.
//!
//! Configuration is stored at `~/.config/oxnav/config.toml` on Linux and the
//! platform equivalent elsewhere. Set `OXNAV_CONFIG_DIR` to use another
//! directory.
//!
//! # Example configuration
//!
//! ```toml
//! storage_root = "/home/user/notes"
//! preferences = "/home/user/.config/oxnav/preferences.json"
//! batch_size = 128
//! ```
//!
//! Every key is optional. Command-line flags take precedence over the file.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use oxnav_core::JsonPreferences;
use oxnav_core::prefs;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Environment variable overriding the configuration directory.
pub const CONFIG_DIR_ENV: &str = "OXNAV_CONFIG_DIR";

const CONFIG_FILE: &str = "config.toml";

/// Contents of `config.toml`.
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Sandbox directory the storage backend is rooted at
    pub storage_root: Option<PathBuf>,

    /// Path of the JSON preference file
    pub preferences: Option<PathBuf>,

    /// Directory reader batch size
    pub batch_size: Option<usize>,
}

impl Config {
    /// Load configuration from `path`, or the default location when `None`.
    ///
    /// A missing file yields the default (empty) configuration.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => config_path()?,
        };

        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        debug!(path = %path.display(), "Loaded config file");
        Ok(config)
    }
}

/// Settings after merging flags, config file and defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub storage_root: PathBuf,
    pub preferences: PathBuf,
    pub batch_size: usize,
}

/// Values given on the command line. `None` defers to the config file.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub storage_root: Option<PathBuf>,
    pub preferences: Option<PathBuf>,
    pub batch_size: Option<usize>,
}

impl Settings {
    pub fn resolve(config: Config, overrides: Overrides) -> Result<Self> {
        let storage_root = match overrides.storage_root.or(config.storage_root) {
            Some(path) => path,
            None => default_storage_root()?,
        };
        let preferences = match overrides.preferences.or(config.preferences) {
            Some(path) => path,
            None => default_preferences_path(std::env::var_os(CONFIG_DIR_ENV).map(PathBuf::from))?,
        };
        let batch_size = overrides
            .batch_size
            .or(config.batch_size)
            .unwrap_or(oxnav_core::storage::local::DEFAULT_BATCH_SIZE);

        Ok(Self {
            storage_root,
            preferences,
            batch_size,
        })
    }
}

fn project_dirs() -> Result<directories::ProjectDirs> {
    prefs::project_dirs().context("Could not determine home directory")
}

/// Preference file inside `config_dir`, or the library default without one.
fn default_preferences_path(config_dir: Option<PathBuf>) -> Result<PathBuf> {
    match config_dir {
        Some(dir) => Ok(dir.join(prefs::PREFERENCES_FILE)),
        None => JsonPreferences::default_path().context("Could not determine home directory"),
    }
}

/// Directory holding `config.toml` and, by default, the preference file.
pub fn config_dir() -> Result<PathBuf> {
    if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV) {
        return Ok(PathBuf::from(dir));
    }
    Ok(project_dirs()?.config_dir().to_path_buf())
}

/// Get the path to the configuration file.
pub fn config_path() -> Result<PathBuf> {
    config_dir().map(|dir| dir.join(CONFIG_FILE))
}

/// Default sandbox: `<data dir>/storage`.
pub fn default_storage_root() -> Result<PathBuf> {
    Ok(project_dirs()?.data_dir().join("storage"))
}
