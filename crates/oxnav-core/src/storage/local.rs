//! Local-disk storage backend.
//!
//! Entries are addressed by `file://` URLs. The sandbox directory is the
//! default root; it is created on first use. Locations outside the sandbox
//! still resolve (the up-navigation entry needs the sandbox's parent), so the
//! only access control is whatever the host filesystem enforces.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument, trace};
use url::Url;

use super::{
    DirectoryReader, EntryKind, NameStep, Storage, StorageError, StorageHandle, name_steps,
};

/// Default number of entries a [`DirectoryReader`] hands out per batch.
pub const DEFAULT_BATCH_SIZE: usize = 64;

/// Storage backed by a directory on the local filesystem.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    sandbox: PathBuf,
    batch_size: usize,
}

impl LocalStorage {
    /// Create a backend rooted at `sandbox`. Nothing touches the disk until
    /// [`Storage::root`] is called.
    pub fn new(sandbox: impl Into<PathBuf>) -> Self {
        Self {
            sandbox: sandbox.into(),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Override the directory reader batch size (minimum 1).
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// The configured sandbox directory, as given.
    pub fn sandbox(&self) -> &Path {
        &self.sandbox
    }

    #[inline]
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }
}

fn entry_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| "/".to_string(), |name| name.to_string_lossy().into_owned())
}

fn handle_for(path: &Path, kind: EntryKind) -> Result<StorageHandle, StorageError> {
    let url = match kind {
        EntryKind::Directory => Url::from_directory_path(path),
        EntryKind::File => Url::from_file_path(path),
    }
    .map_err(|()| StorageError::InvalidLocation {
        location: path.display().to_string(),
        reason: "path is not absolute".to_string(),
    })?;
    Ok(StorageHandle::new(entry_name(path), url, kind))
}

fn path_of(handle: &StorageHandle) -> Result<PathBuf, StorageError> {
    path_from_location(handle.location())
}

fn path_from_location(location: &str) -> Result<PathBuf, StorageError> {
    let url = Url::parse(location).map_err(|e| StorageError::InvalidLocation {
        location: location.to_string(),
        reason: e.to_string(),
    })?;
    if url.scheme() != "file" {
        return Err(StorageError::InvalidLocation {
            location: location.to_string(),
            reason: format!("unsupported scheme '{}'", url.scheme()),
        });
    }
    url.to_file_path()
        .map_err(|()| StorageError::InvalidLocation {
            location: location.to_string(),
            reason: "not a local file URL".to_string(),
        })
}

/// Apply a relative child name to `parent`, resolving `..` lexically.
fn child_path(parent: &StorageHandle, name: &str) -> Result<PathBuf, StorageError> {
    let mut path = path_of(parent)?;
    for step in name_steps(name)? {
        match step {
            NameStep::Parent => {
                if !path.pop() {
                    return Err(StorageError::NotFound {
                        location: format!("{}{name}", parent.location()),
                    });
                }
            }
            NameStep::Child(segment) => path.push(segment),
        }
    }
    Ok(path)
}

async fn entry_kind(path: &Path) -> Result<Option<EntryKind>, StorageError> {
    match fs::metadata(path).await {
        Ok(meta) if meta.is_dir() => Ok(Some(EntryKind::Directory)),
        Ok(_) => Ok(Some(EntryKind::File)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(StorageError::from_io(e, path.display().to_string())),
    }
}

fn mismatch(path: &Path, expected: EntryKind) -> StorageError {
    StorageError::TypeMismatch {
        location: path.display().to_string(),
        expected,
    }
}

#[async_trait]
impl Storage for LocalStorage {
    #[instrument(level = "debug", skip(self), fields(sandbox = %self.sandbox.display()))]
    async fn root(&self) -> Result<StorageHandle, StorageError> {
        let unavailable = |reason: &str, source: std::io::Error| StorageError::Unavailable {
            reason: format!("{reason} '{}'", self.sandbox.display()),
            source: Some(source),
        };

        fs::create_dir_all(&self.sandbox)
            .await
            .map_err(|e| unavailable("cannot create sandbox", e))?;
        let canonical = fs::canonicalize(&self.sandbox)
            .await
            .map_err(|e| unavailable("cannot canonicalize sandbox", e))?;
        let meta = fs::metadata(&canonical)
            .await
            .map_err(|e| unavailable("cannot stat sandbox", e))?;
        if !meta.is_dir() {
            return Err(StorageError::Unavailable {
                reason: format!("sandbox '{}' is not a directory", canonical.display()),
                source: None,
            });
        }

        debug!(root = %canonical.display(), "Local storage root ready");
        handle_for(&canonical, EntryKind::Directory)
    }

    #[instrument(level = "debug", skip(self))]
    async fn resolve_location(&self, location: &str) -> Result<StorageHandle, StorageError> {
        let path = path_from_location(location)?;
        match entry_kind(&path).await? {
            Some(kind) => handle_for(&path, kind),
            None => Err(StorageError::NotFound {
                location: location.to_string(),
            }),
        }
    }

    #[instrument(level = "trace", skip(self, parent), fields(parent = %parent.location()))]
    async fn child_directory(
        &self,
        parent: &StorageHandle,
        name: &str,
        create: bool,
    ) -> Result<StorageHandle, StorageError> {
        parent.expect_kind(EntryKind::Directory)?;
        let target = child_path(parent, name)?;

        match entry_kind(&target).await? {
            Some(EntryKind::Directory) => {}
            Some(EntryKind::File) => return Err(mismatch(&target, EntryKind::Directory)),
            None if create => match fs::create_dir(&target).await {
                Ok(()) => debug!(path = %target.display(), "Created directory"),
                // Someone else created it between the stat and the mkdir.
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    if entry_kind(&target).await? != Some(EntryKind::Directory) {
                        return Err(mismatch(&target, EntryKind::Directory));
                    }
                }
                Err(e) => return Err(StorageError::from_io(e, target.display().to_string())),
            },
            None => {
                return Err(StorageError::NotFound {
                    location: target.display().to_string(),
                });
            }
        }

        handle_for(&target, EntryKind::Directory)
    }

    #[instrument(level = "trace", skip(self, parent), fields(parent = %parent.location()))]
    async fn child_file(
        &self,
        parent: &StorageHandle,
        name: &str,
        create: bool,
    ) -> Result<StorageHandle, StorageError> {
        parent.expect_kind(EntryKind::Directory)?;
        let target = child_path(parent, name)?;

        match entry_kind(&target).await? {
            Some(EntryKind::File) => {}
            Some(EntryKind::Directory) => return Err(mismatch(&target, EntryKind::File)),
            None if create => {
                fs::OpenOptions::new()
                    .write(true)
                    .create(true)
                    .truncate(false)
                    .open(&target)
                    .await
                    .map_err(|e| StorageError::from_io(e, target.display().to_string()))?;
                debug!(path = %target.display(), "Created file");
            }
            None => {
                return Err(StorageError::NotFound {
                    location: target.display().to_string(),
                });
            }
        }

        handle_for(&target, EntryKind::File)
    }

    #[instrument(level = "trace", skip(self, file), fields(file = %file.location()))]
    async fn read_text(&self, file: &StorageHandle) -> Result<String, StorageError> {
        file.expect_kind(EntryKind::File)?;
        let path = path_of(file)?;
        let bytes = fs::read(&path)
            .await
            .map_err(|e| StorageError::from_io(e, file.location()))?;
        trace!(bytes = bytes.len(), "Read file");
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    #[instrument(level = "trace", skip(self, file, data), fields(file = %file.location(), len = data.len()))]
    async fn write_text(&self, file: &StorageHandle, data: &str) -> Result<(), StorageError> {
        file.expect_kind(EntryKind::File)?;
        let path = path_of(file)?;
        let io_err = |e| StorageError::from_io(e, file.location());

        let mut out = fs::File::create(&path).await.map_err(io_err)?;
        out.write_all(data.as_bytes()).await.map_err(io_err)?;
        out.flush().await.map_err(io_err)?;
        out.sync_all().await.map_err(io_err)?;
        Ok(())
    }

    #[instrument(level = "trace", skip(self, dir), fields(dir = %dir.location()))]
    async fn open_reader(
        &self,
        dir: &StorageHandle,
    ) -> Result<Box<dyn DirectoryReader>, StorageError> {
        dir.expect_kind(EntryKind::Directory)?;
        let path = path_of(dir)?;
        let entries = fs::read_dir(&path)
            .await
            .map_err(|e| StorageError::from_io(e, dir.location()))?;
        Ok(Box::new(LocalDirectoryReader {
            entries,
            batch_size: self.batch_size,
            location: dir.location().to_string(),
        }))
    }
}

struct LocalDirectoryReader {
    entries: fs::ReadDir,
    batch_size: usize,
    location: String,
}

#[async_trait]
impl DirectoryReader for LocalDirectoryReader {
    async fn next_batch(&mut self) -> Result<Vec<StorageHandle>, StorageError> {
        let mut batch = Vec::with_capacity(self.batch_size);
        while batch.len() < self.batch_size {
            let Some(entry) = self
                .entries
                .next_entry()
                .await
                .map_err(|e| StorageError::from_io(e, self.location.as_str()))?
            else {
                break;
            };

            let path = entry.path();
            // Follow symlinks; dangling ones are skipped.
            let Some(kind) = entry_kind(&path).await? else {
                trace!(path = %path.display(), "Skipping dangling entry");
                continue;
            };
            batch.push(handle_for(&path, kind)?);
        }
        Ok(batch)
    }
}
