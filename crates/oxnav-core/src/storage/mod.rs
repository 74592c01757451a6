//! Storage capability consumed by the navigator.
//!
//! The navigator never touches a filesystem directly. Everything goes through
//! the [`Storage`] trait, which hands out opaque [`StorageHandle`]s and accepts
//! them back. Two backends ship with the crate:
//!
//! - [`LocalStorage`]: a sandbox directory on the local disk (`file://` locations)
//! - [`MemoryStorage`]: an ephemeral in-process tree (`mem://` locations) with
//!   instrumentation and failure injection for tests

pub mod local;
pub mod memory;

use std::fmt;
use std::hash::{Hash, Hasher};

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

pub use local::LocalStorage;
pub use memory::MemoryStorage;

/// Discriminant between the two kinds of entries a handle can refer to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Directory,
    File,
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryKind::Directory => write!(f, "directory"),
            EntryKind::File => write!(f, "file"),
        }
    }
}

/// Opaque reference to a directory or file inside a storage backend.
///
/// The `location` is the handle's native URL. It is unique per entry, can be
/// fed back into [`Storage::resolve_location`], and is what listing ids are
/// derived from. Directory locations end in `/`.
///
/// Two handles are equal exactly when their locations and kinds are equal;
/// the display name takes no part in comparison or hashing.
#[derive(Debug, Clone, Serialize)]
pub struct StorageHandle {
    name: String,
    location: String,
    kind: EntryKind,
}

impl PartialEq for StorageHandle {
    fn eq(&self, other: &Self) -> bool {
        self.location == other.location && self.kind == other.kind
    }
}

impl Eq for StorageHandle {}

impl Hash for StorageHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.location.hash(state);
        self.kind.hash(state);
    }
}

impl StorageHandle {
    /// Create a handle. Only storage backends should need this.
    pub fn new(name: impl Into<String>, location: impl Into<String>, kind: EntryKind) -> Self {
        Self {
            name: name.into(),
            location: location.into(),
            kind,
        }
    }

    /// Create a directory handle.
    pub fn directory(name: impl Into<String>, location: impl Into<String>) -> Self {
        Self::new(name, location, EntryKind::Directory)
    }

    /// Create a file handle.
    pub fn file(name: impl Into<String>, location: impl Into<String>) -> Self {
        Self::new(name, location, EntryKind::File)
    }

    /// Final path component of the entry.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Native URL of the entry.
    #[inline]
    pub fn location(&self) -> &str {
        &self.location
    }

    #[inline]
    pub fn kind(&self) -> EntryKind {
        self.kind
    }

    #[inline]
    pub fn is_directory(&self) -> bool {
        self.kind == EntryKind::Directory
    }

    #[inline]
    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }

    /// Fail with [`StorageError::WrongHandleKind`] unless this handle is of `expected` kind.
    pub fn expect_kind(&self, expected: EntryKind) -> Result<(), StorageError> {
        if self.kind == expected {
            Ok(())
        } else {
            Err(StorageError::WrongHandleKind {
                location: self.location.clone(),
                expected,
            })
        }
    }
}

impl fmt::Display for StorageHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.location)
    }
}

/// Errors reported by a storage backend.
#[derive(Error, Debug)]
pub enum StorageError {
    /// The backend itself cannot be used (root missing, not creatable, revoked).
    #[error("Storage unavailable: {reason}")]
    Unavailable {
        reason: String,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("No entry at '{location}'")]
    NotFound { location: String },

    /// An entry exists at the location but is of the other kind.
    #[error("Entry at '{location}' exists but is not a {expected}")]
    TypeMismatch {
        location: String,
        expected: EntryKind,
    },

    /// A handle of the wrong kind was passed in (e.g. a file used as a parent).
    #[error("Handle '{location}' is not a {expected}")]
    WrongHandleKind {
        location: String,
        expected: EntryKind,
    },

    #[error("Cannot resolve location '{location}': {reason}")]
    InvalidLocation { location: String, reason: String },

    #[error("Invalid entry name '{name}'")]
    InvalidName { name: String },

    #[error("Access denied to '{location}'")]
    PermissionDenied { location: String },

    #[error("IO error at '{location}': {source}")]
    Io {
        location: String,
        #[source]
        source: std::io::Error,
    },
}

impl StorageError {
    /// Map an IO error onto the storage taxonomy.
    pub fn from_io(source: std::io::Error, location: impl Into<String>) -> Self {
        let location = location.into();
        match source.kind() {
            std::io::ErrorKind::NotFound => StorageError::NotFound { location },
            std::io::ErrorKind::PermissionDenied => StorageError::PermissionDenied { location },
            _ => StorageError::Io { location, source },
        }
    }

    /// True for [`StorageError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound { .. })
    }
}

/// Asynchronous, handle-based storage capability.
///
/// Every method is a suspension point. Implementations must make
/// `child_directory(.., create = true)` idempotent: creating a directory that
/// already exists (including one created concurrently by another caller)
/// returns the existing directory.
///
/// Child names are relative paths: they may contain `/` separators and `..`
/// segments, which are resolved lexically against the parent. Walking above
/// the top of the backend's namespace yields [`StorageError::NotFound`].
#[async_trait]
pub trait Storage: Send + Sync + fmt::Debug {
    /// The default persistent root. Failure here means the capability is unavailable.
    async fn root(&self) -> Result<StorageHandle, StorageError>;

    /// Resolve a handle from a location previously obtained from [`StorageHandle::location`].
    async fn resolve_location(&self, location: &str) -> Result<StorageHandle, StorageError>;

    /// Look up (and optionally create) a directory below `parent`.
    async fn child_directory(
        &self,
        parent: &StorageHandle,
        name: &str,
        create: bool,
    ) -> Result<StorageHandle, StorageError>;

    /// Look up (and optionally create) a file below `parent`.
    ///
    /// Creating never truncates an existing file.
    async fn child_file(
        &self,
        parent: &StorageHandle,
        name: &str,
        create: bool,
    ) -> Result<StorageHandle, StorageError>;

    /// Read the whole file as text.
    async fn read_text(&self, file: &StorageHandle) -> Result<String, StorageError>;

    /// Replace the whole file content. Returns once the write has completed.
    async fn write_text(&self, file: &StorageHandle, data: &str) -> Result<(), StorageError>;

    /// Start enumerating the immediate children of `dir`.
    async fn open_reader(
        &self,
        dir: &StorageHandle,
    ) -> Result<Box<dyn DirectoryReader>, StorageError>;
}

/// Batched enumeration of a directory's immediate children.
#[async_trait]
pub trait DirectoryReader: Send {
    /// Next batch of entries. An empty batch means the enumeration is exhausted.
    async fn next_batch(&mut self) -> Result<Vec<StorageHandle>, StorageError>;
}

/// One step of a relative child name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NameStep<'a> {
    Parent,
    Child(&'a str),
}

/// Split a child name into steps, dropping empty and `.` segments.
pub(crate) fn name_steps(name: &str) -> Result<Vec<NameStep<'_>>, StorageError> {
    if name.contains('\0') {
        return Err(StorageError::InvalidName {
            name: name.to_string(),
        });
    }

    let steps: Vec<NameStep<'_>> = name
        .split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .map(|segment| {
            if segment == ".." {
                NameStep::Parent
            } else {
                NameStep::Child(segment)
            }
        })
        .collect();

    if steps.is_empty() {
        return Err(StorageError::InvalidName {
            name: name.to_string(),
        });
    }
    Ok(steps)
}
