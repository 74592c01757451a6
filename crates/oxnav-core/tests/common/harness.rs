//! Test harness for navigator integration tests.
//!
//! Provides controllers over both storage backends, keeping a handle on the
//! backend and preference store so tests can inspect side effects.

use std::path::Path;
use std::sync::{Arc, Once};

use oxnav_core::{FileController, LocalStorage, MemoryPreferences, MemoryStorage};
use tempfile::TempDir;

static TRACING: Once = Once::new();

/// Install a test subscriber honoring `RUST_LOG`. Runs at most once per process.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Controller over an in-memory store.
pub struct MemoryNavigator {
    pub storage: MemoryStorage,
    pub prefs: MemoryPreferences,
    pub controller: FileController,
}

impl MemoryNavigator {
    pub fn new() -> Self {
        Self::with(MemoryStorage::new(), MemoryPreferences::new())
    }

    pub fn with(storage: MemoryStorage, prefs: MemoryPreferences) -> Self {
        init_tracing();
        let controller = FileController::new(Arc::new(storage.clone()), Arc::new(prefs.clone()));
        Self {
            storage,
            prefs,
            controller,
        }
    }

    /// A second controller over the same store and preferences, as after a restart.
    pub fn restart(&self) -> Self {
        Self::with(self.storage.clone(), self.prefs.clone())
    }
}

/// Controller over a temporary sandbox on disk.
pub struct LocalNavigator {
    pub prefs: MemoryPreferences,
    pub controller: FileController,
    /// Temporary sandbox (cleaned up on drop).
    temp: TempDir,
}

impl LocalNavigator {
    pub fn new() -> Self {
        Self::with_batch_size(oxnav_core::storage::local::DEFAULT_BATCH_SIZE)
    }

    pub fn with_batch_size(batch_size: usize) -> Self {
        init_tracing();
        let temp = tempfile::tempdir().expect("Failed to create temp dir");
        let storage = LocalStorage::new(temp.path().join("sandbox")).with_batch_size(batch_size);
        let prefs = MemoryPreferences::new();
        let controller = FileController::new(Arc::new(storage), Arc::new(prefs.clone()));
        Self {
            prefs,
            controller,
            temp,
        }
    }

    /// Path of the sandbox directory on disk.
    pub fn sandbox(&self) -> std::path::PathBuf {
        self.temp.path().join("sandbox")
    }

    pub fn read(&self, relative: impl AsRef<Path>) -> String {
        let path = self.sandbox().join(relative);
        std::fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("Failed to read {}: {}", path.display(), e))
    }
}
