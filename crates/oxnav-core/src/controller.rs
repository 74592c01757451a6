//! The file controller: one object tying storage, preferences and the
//! resolved root together.
//!
//! Root resolution runs exactly once per controller. The attempt is kept as a
//! memoized shared future; every operation awaits it first, so callers may
//! issue requests immediately after construction and they simply wait until
//! the root is known. A failed initialization is memoized as well and every
//! later operation reports it.

use std::fmt;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::file::{self, WriteError};
use crate::listing::{self, ListingError, ListingNode};
use crate::navigator::{self, PathResolutionError, ResolvedFile};
use crate::path::PathRequest;
use crate::prefs::{PreferenceError, Preferences, ROOT_LOCATION_KEY};
use crate::root::{InitError, InitStatus, RootState, resolve_root};
use crate::storage::{EntryKind, Storage, StorageError, StorageHandle};

/// Outcome of initialization as shared between all awaiters.
pub type InitResult = Result<RootState, Arc<InitError>>;

type InitFuture = Shared<BoxFuture<'static, InitResult>>;

/// Errors returned by [`FileController`] operations.
#[derive(Debug, Error)]
pub enum NavError {
    #[error("Missing argument: {0}")]
    MissingArgument(&'static str),

    #[error("Initialization failed: {0}")]
    Init(#[source] Arc<InitError>),

    #[error(transparent)]
    Path(#[from] PathResolutionError),

    #[error(transparent)]
    Listing(#[from] ListingError),

    #[error(transparent)]
    Write(#[from] WriteError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Preference(#[from] PreferenceError),
}

impl From<Arc<InitError>> for NavError {
    fn from(err: Arc<InitError>) -> Self {
        NavError::Init(err)
    }
}

impl NavError {
    /// The storage error underneath this error, if any.
    pub fn storage_error(&self) -> Option<&StorageError> {
        match self {
            NavError::Path(e) => Some(&e.source),
            NavError::Listing(ListingError::Read { source, .. })
            | NavError::Write(WriteError { source, .. })
            | NavError::Storage(source) => Some(source),
            NavError::Init(e) => match e.as_ref() {
                InitError::CapabilityUnavailable { source } => Some(source),
            },
            NavError::MissingArgument(_) | NavError::Preference(_) => None,
        }
    }

    /// True when the underlying cause is a missing entry.
    pub fn is_not_found(&self) -> bool {
        self.storage_error().is_some_and(StorageError::is_not_found)
    }
}

/// Asynchronous file navigation over a storage capability.
///
/// Construct once per process (or per storage sandbox) and share it; the
/// controller is cheap to use concurrently from many tasks.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use oxnav_core::controller::FileController;
/// use oxnav_core::prefs::MemoryPreferences;
/// use oxnav_core::storage::MemoryStorage;
///
/// # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
/// let controller = FileController::new(
///     Arc::new(MemoryStorage::new()),
///     Arc::new(MemoryPreferences::new()),
/// );
///
/// controller.write_file_by_name("notes/today.txt", "hello").await.unwrap();
/// let file = controller.read_file_by_name("notes/today.txt").await.unwrap().unwrap();
/// assert_eq!(file.content, "hello");
/// # });
/// ```
pub struct FileController {
    storage: Arc<dyn Storage>,
    prefs: Arc<dyn Preferences>,
    init: InitFuture,
}

impl fmt::Debug for FileController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileController")
            .field("storage", &self.storage)
            .field("prefs", &self.prefs)
            .field("status", &self.status())
            .finish()
    }
}

impl FileController {
    /// Create a controller and start root resolution.
    ///
    /// Inside a Tokio runtime the resolution is spawned right away; outside
    /// one it runs when the first operation is awaited. Either way it runs
    /// exactly once.
    pub fn new(storage: Arc<dyn Storage>, prefs: Arc<dyn Preferences>) -> Self {
        let init = {
            let storage = Arc::clone(&storage);
            let prefs = Arc::clone(&prefs);
            async move {
                resolve_root(storage.as_ref(), prefs.as_ref())
                    .await
                    .map_err(Arc::new)
            }
            .boxed()
            .shared()
        };

        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            debug!("Spawning root resolution");
            let driver = init.clone();
            runtime.spawn(async move {
                // The outcome is memoized in the shared future.
                let _ = driver.await;
            });
        }

        Self {
            storage,
            prefs,
            init,
        }
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    pub fn preferences(&self) -> &Arc<dyn Preferences> {
        &self.prefs
    }

    // ==================== Initialization ====================

    /// Await root resolution.
    pub async fn initialize(&self) -> InitResult {
        self.init.clone().await
    }

    /// Await root resolution. Safe to call any number of times.
    pub async fn wait_for_init(&self) -> InitResult {
        self.initialize().await
    }

    /// Alias for [`wait_for_init`](Self::wait_for_init).
    pub async fn wait(&self) -> InitResult {
        self.initialize().await
    }

    /// Current initialization state, without waiting.
    pub fn status(&self) -> InitStatus {
        match self.init.peek() {
            None => InitStatus::Pending,
            Some(Ok(_)) => InitStatus::Ready,
            Some(Err(_)) => InitStatus::Failed,
        }
    }

    async fn state(&self) -> Result<RootState, NavError> {
        Ok(self.initialize().await?)
    }

    /// The directory logical paths are resolved against.
    #[instrument(level = "debug", skip(self))]
    pub async fn root(&self) -> Result<StorageHandle, NavError> {
        Ok(self.state().await?.root().clone())
    }

    // ==================== Paths ====================

    /// Resolve `path` against the root, creating what is missing, and read it.
    ///
    /// Returns `Ok(None)` for directory-only paths.
    #[instrument(level = "debug", skip(self))]
    pub async fn read_file_by_name(&self, path: &str) -> Result<Option<ResolvedFile>, NavError> {
        let state = self.state().await?;
        Ok(navigator::resolve_file(self.storage.as_ref(), state.root(), path).await?)
    }

    /// Resolve `path` against `root`, creating what is missing, and read it.
    #[instrument(level = "debug", skip(self, root), fields(root = %root.location()))]
    pub async fn resolve_file(
        &self,
        root: &StorageHandle,
        path: &str,
    ) -> Result<Option<ResolvedFile>, NavError> {
        self.state().await?;
        Ok(navigator::resolve_file(self.storage.as_ref(), root, path).await?)
    }

    /// Look up the directory `path` below `base` (the root when `None`).
    ///
    /// `path` is handed to the storage as a single relative name, so it may
    /// contain separators and `..` segments.
    #[instrument(level = "debug", skip(self, base))]
    pub async fn get_directory(
        &self,
        path: &str,
        base: Option<&StorageHandle>,
        create: bool,
    ) -> Result<StorageHandle, NavError> {
        if path.is_empty() {
            return Err(NavError::MissingArgument("path"));
        }
        let state = self.state().await?;
        let base = base.unwrap_or(state.root());
        Ok(self.storage.child_directory(base, path, create).await?)
    }

    // ==================== Listing ====================

    /// List the children of `dir` (the root when `None`).
    ///
    /// With `nav_enabled`, listing the root prepends an up-navigation node.
    #[instrument(level = "debug", skip(self, dir), fields(dir = dir.map(StorageHandle::location)))]
    pub async fn list_children(
        &self,
        dir: Option<&StorageHandle>,
        nav_enabled: bool,
    ) -> Result<Vec<ListingNode>, NavError> {
        let state = self.state().await?;
        let dir = dir.unwrap_or(state.root());
        Ok(listing::list_children(self.storage.as_ref(), dir, nav_enabled, state.root()).await?)
    }

    // ==================== Content ====================

    #[instrument(level = "debug", skip(self, file), fields(file = %file.location()))]
    pub async fn read_file(&self, file: &StorageHandle) -> Result<String, NavError> {
        self.state().await?;
        Ok(file::read_text(self.storage.as_ref(), file).await?)
    }

    /// Replace the content of `file`.
    #[instrument(level = "debug", skip(self, file, text), fields(file = %file.location(), bytes = text.len()))]
    pub async fn write_file(&self, file: &StorageHandle, text: &str) -> Result<(), NavError> {
        self.state().await?;
        Ok(file::write_text(self.storage.as_ref(), file, text).await?)
    }

    /// Resolve (creating as needed) the file at `path` and replace its content.
    #[instrument(level = "debug", skip(self, text), fields(bytes = text.len()))]
    pub async fn write_file_by_name(
        &self,
        path: &str,
        text: &str,
    ) -> Result<StorageHandle, NavError> {
        if PathRequest::parse(path).is_directory_only() {
            return Err(NavError::MissingArgument("file name"));
        }
        let state = self.state().await?;
        let file = navigator::open_file(self.storage.as_ref(), state.root(), path)
            .await?
            .ok_or(NavError::MissingArgument("file name"))?;
        file::write_text(self.storage.as_ref(), &file, text).await?;
        Ok(file)
    }

    // ==================== Root selection ====================

    /// Persist `dir` as the root for the next controller.
    ///
    /// The current controller keeps its root.
    #[instrument(level = "info", skip(self, dir), fields(dir = %dir.location()))]
    pub async fn remember_root(&self, dir: &StorageHandle) -> Result<(), NavError> {
        dir.expect_kind(EntryKind::Directory)?;
        self.state().await?;
        self.prefs.set(ROOT_LOCATION_KEY, dir.location())?;
        info!("Remembered root");
        Ok(())
    }
}
