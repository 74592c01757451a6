//! Path navigation.
//!
//! Resolves a logical path against a starting directory, creating every
//! missing directory along the way and, unless the path names only
//! directories, the terminal file. Reading a path therefore always leaves it
//! resolvable afterwards.
//!
//! The walk is a strict left-to-right fold: each lookup needs the handle the
//! previous one produced, so nothing here runs in parallel. Concurrent walks
//! of overlapping paths rely on the storage capability's idempotent
//! create-if-missing; the navigator holds no locks.
//!
//! Paths never leave the directory they are resolved against: `.` components
//! are no-ops and a path with a `..` component is refused before the storage
//! is touched.

use std::fmt;

use thiserror::Error;
use tracing::{debug, instrument, trace};

use crate::path::PathRequest;
use crate::storage::{Storage, StorageError, StorageHandle};

/// Which step of a resolution failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionStep {
    Directory,
    File,
    Read,
}

impl fmt::Display for ResolutionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolutionStep::Directory => write!(f, "directory"),
            ResolutionStep::File => write!(f, "file"),
            ResolutionStep::Read => write!(f, "read of"),
        }
    }
}

/// A path could not be resolved. No partial result is reported.
#[derive(Debug, Error)]
#[error("Failed to resolve {step} '{component}' in path '{path}': {source}")]
pub struct PathResolutionError {
    /// The logical path being resolved.
    pub path: String,
    /// The component whose resolution failed.
    pub component: String,
    pub step: ResolutionStep,
    #[source]
    pub source: StorageError,
}

impl PathResolutionError {
    pub(crate) fn new(
        path: &str,
        component: &str,
        step: ResolutionStep,
        source: StorageError,
    ) -> Self {
        Self {
            path: path.to_string(),
            component: component.to_string(),
            step,
            source,
        }
    }
}

/// A resolved file together with its full text content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFile {
    pub handle: StorageHandle,
    pub content: String,
}

/// Refuse a request that would climb above its starting directory.
fn reject_parent_component(request: &PathRequest<'_>) -> Result<(), PathResolutionError> {
    let Some(component) = request.parent_component() else {
        return Ok(());
    };
    let step = if request.file_name() == Some(component) {
        ResolutionStep::File
    } else {
        ResolutionStep::Directory
    };
    Err(PathResolutionError::new(
        request.as_str(),
        component,
        step,
        StorageError::InvalidName {
            name: component.to_string(),
        },
    ))
}

/// Walk (creating as needed) the directory components of `request`.
///
/// Returns the innermost directory, or `start` itself when the request has
/// no directory components. Fails without any storage call when the request
/// contains a `..` component.
#[instrument(level = "debug", skip(storage, start, request), fields(start = %start.location(), path = %request))]
pub async fn walk_directories(
    storage: &dyn Storage,
    start: &StorageHandle,
    request: &PathRequest<'_>,
) -> Result<StorageHandle, PathResolutionError> {
    reject_parent_component(request)?;
    let mut current = start.clone();
    for (depth, component) in request.directories().enumerate() {
        trace!(component = %component, depth = depth, "Descending");
        current = storage
            .child_directory(&current, component, true)
            .await
            .map_err(|e| {
                PathResolutionError::new(request.as_str(), component, ResolutionStep::Directory, e)
            })?;
    }
    debug!(directory = %current.location(), depth = request.depth(), "Walked directories");
    Ok(current)
}

/// Resolve (creating as needed) the file named by `path` under `root`.
///
/// Returns `Ok(None)` for directory-only paths (empty or ending in `/`);
/// the directories are still created, but no file is.
#[instrument(level = "debug", skip(storage, root), fields(root = %root.location()))]
pub async fn open_file(
    storage: &dyn Storage,
    root: &StorageHandle,
    path: &str,
) -> Result<Option<StorageHandle>, PathResolutionError> {
    let request = PathRequest::parse(path);
    reject_parent_component(&request)?;
    let directory = walk_directories(storage, root, &request).await?;

    let Some(file_name) = request.file_name() else {
        debug!("Directory-only path, no file resolved");
        return Ok(None);
    };

    let handle = storage
        .child_file(&directory, file_name, true)
        .await
        .map_err(|e| PathResolutionError::new(path, file_name, ResolutionStep::File, e))?;
    trace!(file = %handle.location(), "Resolved file");
    Ok(Some(handle))
}

/// Resolve the file named by `path` under `root` and read its content.
///
/// # Examples
///
/// ```
/// use oxnav_core::navigator::resolve_file;
/// use oxnav_core::storage::{MemoryStorage, Storage};
///
/// # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
/// let storage = MemoryStorage::new();
/// let root = storage.root().await.unwrap();
///
/// let file = resolve_file(&storage, &root, "notes/today.txt").await.unwrap().unwrap();
/// assert_eq!(file.content, "");
/// assert!(storage.is_file("/persistent/notes/today.txt"));
///
/// assert!(resolve_file(&storage, &root, "notes/").await.unwrap().is_none());
/// # });
/// ```
#[instrument(level = "debug", skip(storage, root), fields(root = %root.location()))]
pub async fn resolve_file(
    storage: &dyn Storage,
    root: &StorageHandle,
    path: &str,
) -> Result<Option<ResolvedFile>, PathResolutionError> {
    let Some(handle) = open_file(storage, root, path).await? else {
        return Ok(None);
    };

    let content = storage.read_text(&handle).await.map_err(|e| {
        PathResolutionError::new(path, handle.name(), ResolutionStep::Read, e)
    })?;
    debug!(bytes = content.len(), "Read resolved file");
    Ok(Some(ResolvedFile { handle, content }))
}
