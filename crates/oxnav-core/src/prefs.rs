//! Preference persistence.
//!
//! The navigator keeps exactly one durable preference: the location string of
//! the root the user last chose ([`ROOT_LOCATION_KEY`]). Storage of that value
//! is abstracted behind [`Preferences`] so embedders can route it to whatever
//! settings store they already have.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use directories::ProjectDirs;
use parking_lot::{Mutex, RwLock};
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Key under which the remembered root location is stored.
pub const ROOT_LOCATION_KEY: &str = "rootURL";

/// Errors from a preference store.
#[derive(Debug, Error)]
pub enum PreferenceError {
    #[error("Failed to access preferences at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode preferences: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Failed to find config directory")]
    NoConfigDir,
}

/// Process-wide key/value preference store, durable across restarts.
pub trait Preferences: Send + Sync + fmt::Debug {
    fn get(&self, key: &str) -> Result<Option<String>, PreferenceError>;

    fn set(&self, key: &str, value: &str) -> Result<(), PreferenceError>;
}

/// Non-durable preferences held in memory. Clones share the same values.
#[derive(Debug, Clone, Default)]
pub struct MemoryPreferences {
    values: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryPreferences {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with a single value.
    pub fn with_value(key: &str, value: &str) -> Self {
        let prefs = Self::default();
        prefs
            .values
            .write()
            .insert(key.to_string(), value.to_string());
        prefs
    }

    /// Current value without going through the fallible trait method.
    pub fn value(&self, key: &str) -> Option<String> {
        self.values.read().get(key).cloned()
    }
}

impl Preferences for MemoryPreferences {
    fn get(&self, key: &str) -> Result<Option<String>, PreferenceError> {
        Ok(self.value(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), PreferenceError> {
        self.values
            .write()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Outcome of loading a [`JsonPreferences`] file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreferenceLoadStatus {
    /// File existed and parsed.
    Loaded,
    /// No file yet, starting empty.
    Fresh,
    /// File could not be parsed; a copy was saved and the store starts empty.
    Corrupted { backup_path: PathBuf, error: String },
}

/// Preferences persisted as a flat JSON object.
///
/// Values are loaded once on open and cached; every `set` rewrites the file
/// through a temporary file in the same directory followed by a rename, so a
/// crash never leaves a half-written file behind.
#[derive(Debug)]
pub struct JsonPreferences {
    path: PathBuf,
    values: Mutex<BTreeMap<String, String>>,
    status: PreferenceLoadStatus,
}

/// File name of the preference store inside the config directory.
pub const PREFERENCES_FILE: &str = "preferences.json";

/// Platform directories for oxnav (config, data and cache).
pub fn project_dirs() -> Result<ProjectDirs, PreferenceError> {
    ProjectDirs::from("com", "oxnav", "oxnav").ok_or(PreferenceError::NoConfigDir)
}

impl JsonPreferences {
    /// Default file location: [`PREFERENCES_FILE`] in the platform config directory.
    pub fn default_path() -> Result<PathBuf, PreferenceError> {
        Ok(project_dirs()?.config_dir().join(PREFERENCES_FILE))
    }

    /// Open (or start) the store at `path`.
    ///
    /// A missing file yields an empty store. A file that is not a JSON object
    /// of strings is backed up next to the original and replaced by an empty
    /// store on the next write.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, PreferenceError> {
        let path = path.into();

        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No preference file, starting empty");
                return Ok(Self {
                    path,
                    values: Mutex::new(BTreeMap::new()),
                    status: PreferenceLoadStatus::Fresh,
                });
            }
            Err(source) => return Err(PreferenceError::Io { path, source }),
        };

        let (values, status) = match serde_json::from_str::<BTreeMap<String, String>>(&contents) {
            Ok(values) => {
                info!(path = %path.display(), count = values.len(), "Loaded preferences");
                (values, PreferenceLoadStatus::Loaded)
            }
            Err(e) => {
                error!(path = %path.display(), error = %e, "Failed to parse preferences");
                let backup_path = backup_corrupted(&path, &contents);
                (
                    BTreeMap::new(),
                    PreferenceLoadStatus::Corrupted {
                        backup_path,
                        error: e.to_string(),
                    },
                )
            }
        };

        Ok(Self {
            path,
            values: Mutex::new(values),
            status,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load_status(&self) -> &PreferenceLoadStatus {
        &self.status
    }

    fn persist(&self, values: &BTreeMap<String, String>) -> Result<(), PreferenceError> {
        let io_err = |source| PreferenceError::Io {
            path: self.path.clone(),
            source,
        };

        let parent = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(parent).map_err(io_err)?;

        let contents = serde_json::to_string_pretty(values)?;
        let mut temp = tempfile::NamedTempFile::new_in(parent).map_err(io_err)?;
        temp.write_all(contents.as_bytes()).map_err(io_err)?;
        temp.as_file().sync_all().map_err(io_err)?;
        temp.persist(&self.path).map_err(|e| io_err(e.error))?;

        debug!(path = %self.path.display(), "Saved preferences");
        Ok(())
    }
}

fn backup_corrupted(path: &Path, contents: &str) -> PathBuf {
    let backup_path = path.with_extension("corrupted.json");
    if let Err(e) = std::fs::write(&backup_path, contents) {
        warn!(
            backup = %backup_path.display(),
            error = %e,
            "Failed to back up corrupted preferences"
        );
    } else {
        info!(backup = %backup_path.display(), "Backed up corrupted preferences");
    }
    backup_path
}

impl Preferences for JsonPreferences {
    fn get(&self, key: &str) -> Result<Option<String>, PreferenceError> {
        Ok(self.values.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), PreferenceError> {
        let mut values = self.values.lock();
        let previous = values.insert(key.to_string(), value.to_string());
        if let Err(e) = self.persist(&values) {
            // Keep the cache consistent with what is on disk.
            match previous {
                Some(previous) => values.insert(key.to_string(), previous),
                None => values.remove(key),
            };
            return Err(e);
        }
        Ok(())
    }
}
