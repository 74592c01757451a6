//! Root resolution.
//!
//! Picks the directory every logical path is resolved against. The default
//! persistent root comes from the storage capability; if the user previously
//! chose a different root its location is stored under
//! [`ROOT_LOCATION_KEY`](crate::prefs::ROOT_LOCATION_KEY) and re-resolved here.
//! A remembered location that no longer resolves is replaced by the default
//! root's location so later launches do not retry it.

use std::fmt;

use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

use crate::prefs::{Preferences, ROOT_LOCATION_KEY};
use crate::storage::{Storage, StorageError, StorageHandle};

/// Fatal initialization failure.
#[derive(Debug, Error)]
pub enum InitError {
    #[error("Storage capability unavailable: {source}")]
    CapabilityUnavailable {
        #[source]
        source: StorageError,
    },
}

/// A remembered root that could not be re-resolved. Logged, never returned.
#[derive(Debug, Error)]
#[error("Failed to resolve remembered root '{location}': {reason}")]
pub struct RootResolutionFailed {
    pub location: String,
    pub reason: String,
    #[source]
    pub source: Option<StorageError>,
}

/// Why the active root was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootSource {
    /// No remembered root.
    Default,
    /// The remembered root resolved.
    Remembered,
    /// The remembered root failed to resolve; the preference was reset.
    Fallback,
}

/// Initialization state as observed by callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitStatus {
    Pending,
    Ready,
    Failed,
}

impl fmt::Display for InitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InitStatus::Pending => write!(f, "pending"),
            InitStatus::Ready => write!(f, "ready"),
            InitStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Outcome of a successful initialization. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootState {
    root: StorageHandle,
    default_root: StorageHandle,
    source: RootSource,
}

impl RootState {
    /// The directory logical paths are resolved against.
    #[inline]
    pub fn root(&self) -> &StorageHandle {
        &self.root
    }

    /// The storage capability's own persistent root.
    #[inline]
    pub fn default_root(&self) -> &StorageHandle {
        &self.default_root
    }

    #[inline]
    pub fn source(&self) -> RootSource {
        self.source
    }
}

/// Run one root resolution attempt.
///
/// Only failure to obtain the default root is fatal. Everything that goes
/// wrong with the remembered root (unreadable preference, unresolvable
/// location, a location that names a file, failure to reset the preference)
/// is logged and degrades to the default root.
#[instrument(level = "info", skip_all)]
pub async fn resolve_root(
    storage: &dyn Storage,
    prefs: &dyn Preferences,
) -> Result<RootState, InitError> {
    let default_root = storage.root().await.map_err(|source| {
        error!(error = %source, "Storage capability unavailable");
        InitError::CapabilityUnavailable { source }
    })?;
    debug!(default_root = %default_root.location(), "Acquired default root");

    let remembered = match prefs.get(ROOT_LOCATION_KEY) {
        Ok(value) => value.filter(|location| !location.is_empty()),
        Err(e) => {
            warn!(error = %e, "Failed to read remembered root, using default root");
            None
        }
    };

    let Some(location) = remembered else {
        info!(root = %default_root.location(), "Using default root");
        return Ok(RootState {
            root: default_root.clone(),
            default_root,
            source: RootSource::Default,
        });
    };

    let failure = match storage.resolve_location(&location).await {
        Ok(root) if root.is_directory() => {
            info!(root = %root.location(), "Using remembered root");
            return Ok(RootState {
                root,
                default_root,
                source: RootSource::Remembered,
            });
        }
        Ok(_) => RootResolutionFailed {
            location,
            reason: "location is not a directory".to_string(),
            source: None,
        },
        Err(source) => RootResolutionFailed {
            location,
            reason: source.to_string(),
            source: Some(source),
        },
    };

    error!(error = %failure, "Falling back to default root");
    if let Err(e) = prefs.set(ROOT_LOCATION_KEY, default_root.location()) {
        warn!(error = %e, "Failed to reset remembered root");
    }

    Ok(RootState {
        root: default_root.clone(),
        default_root,
        source: RootSource::Fallback,
    })
}
