//! In-process storage backend.
//!
//! `MemoryStorage` keeps a small directory tree behind a mutex and addresses
//! entries with `mem://` URLs. It yields to the scheduler at every operation so
//! callers observe the same suspension points as with a real backend.
//!
//! Besides serving as an ephemeral store it carries the instrumentation the
//! test-suite relies on: call counters, configurable reader batch size and
//! failure injection.
//!
//! ```
//! use oxnav_core::storage::MemoryStorage;
//!
//! let storage = MemoryStorage::new();
//! storage.insert_file("/persistent/notes/today.txt", "hello");
//! assert!(storage.is_dir("/persistent/notes"));
//! assert_eq!(storage.file_content("/persistent/notes/today.txt").as_deref(), Some("hello"));
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, instrument};

use super::{
    DirectoryReader, EntryKind, NameStep, Storage, StorageError, StorageHandle, name_steps,
};

const SCHEME: &str = "mem://";

/// Default sandbox path used by [`MemoryStorage::new`].
pub const DEFAULT_SANDBOX: &str = "/persistent";

const DEFAULT_BATCH_SIZE: usize = 16;

#[derive(Debug)]
enum Node {
    Directory { children: Vec<String> },
    File { content: String },
}

#[derive(Debug, Default)]
struct Faults {
    root_unavailable: bool,
    unresolvable: HashSet<String>,
    unreadable: HashSet<String>,
    denied: HashSet<String>,
}

#[derive(Debug, Default)]
struct Counters {
    root_calls: AtomicUsize,
    resolve_calls: AtomicUsize,
    directories_created: AtomicUsize,
    files_created: AtomicUsize,
    writes: AtomicUsize,
}

#[derive(Debug)]
struct Inner {
    /// Keyed by normalized absolute path ("/" for the top of the namespace).
    nodes: Mutex<HashMap<String, Node>>,
    faults: Mutex<Faults>,
    counters: Counters,
    sandbox: String,
}

/// Ephemeral storage backend. Clones share the same tree, faults and counters.
#[derive(Debug, Clone)]
pub struct MemoryStorage {
    inner: Arc<Inner>,
    batch_size: usize,
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

fn join(parent: &str, name: &str) -> String {
    if parent == "/" {
        format!("/{name}")
    } else {
        format!("{parent}/{name}")
    }
}

fn parent_of(path: &str) -> Option<&str> {
    if path == "/" {
        return None;
    }
    match path.rfind('/') {
        Some(0) => Some("/"),
        Some(idx) => Some(&path[..idx]),
        None => None,
    }
}

fn name_of(path: &str) -> &str {
    if path == "/" {
        "/"
    } else {
        path.rsplit('/').next().unwrap_or(path)
    }
}

fn location_of(path: &str, kind: EntryKind) -> String {
    match kind {
        EntryKind::Directory if path == "/" => format!("{SCHEME}/"),
        EntryKind::Directory => format!("{SCHEME}{path}/"),
        EntryKind::File => format!("{SCHEME}{path}"),
    }
}

fn handle_for(path: &str, kind: EntryKind) -> StorageHandle {
    StorageHandle::new(name_of(path), location_of(path, kind), kind)
}

/// Normalize an absolute path: collapse separators, resolve `.`/`..`.
fn normalize(path: &str) -> Option<String> {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop()?;
            }
            other => segments.push(other),
        }
    }
    Some(format!("/{}", segments.join("/")))
}

fn path_from_location(location: &str) -> Result<String, StorageError> {
    let invalid = |reason: &str| StorageError::InvalidLocation {
        location: location.to_string(),
        reason: reason.to_string(),
    };
    let rest = location
        .strip_prefix(SCHEME)
        .ok_or_else(|| invalid("unsupported scheme"))?;
    if !rest.starts_with('/') {
        return Err(invalid("location is not absolute"));
    }
    normalize(rest).ok_or_else(|| invalid("location escapes the namespace"))
}

impl MemoryStorage {
    /// Empty store whose default root is [`DEFAULT_SANDBOX`].
    pub fn new() -> Self {
        Self::with_sandbox(DEFAULT_SANDBOX)
    }

    /// Empty store whose default root is `sandbox` (created on demand by
    /// [`Storage::root`]). Use `"/"` for a root without a parent.
    pub fn with_sandbox(sandbox: &str) -> Self {
        let sandbox = normalize(sandbox).unwrap_or_else(|| "/".to_string());
        let mut nodes = HashMap::new();
        nodes.insert(
            "/".to_string(),
            Node::Directory {
                children: Vec::new(),
            },
        );
        Self {
            inner: Arc::new(Inner {
                nodes: Mutex::new(nodes),
                faults: Mutex::new(Faults::default()),
                counters: Counters::default(),
                sandbox,
            }),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Override the directory reader batch size (minimum 1).
    ///
    /// Only the returned value reads with the new size; the tree, injected
    /// faults and counters stay shared with every clone.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Path of the default root.
    pub fn sandbox(&self) -> &str {
        &self.inner.sandbox
    }

    // ==================== Seeding and inspection ====================

    /// Create the directory at `path` and any missing ancestors.
    pub fn insert_dir(&self, path: &str) {
        let Some(path) = normalize(path) else { return };
        let mut nodes = self.inner.nodes.lock();
        ensure_dir(&mut nodes, &path);
    }

    /// Create or replace the file at `path`, creating missing ancestors.
    pub fn insert_file(&self, path: &str, content: &str) {
        let Some(path) = normalize(path) else { return };
        let Some(parent) = parent_of(&path).map(str::to_string) else {
            return;
        };
        let mut nodes = self.inner.nodes.lock();
        ensure_dir(&mut nodes, &parent);
        insert_child(&mut nodes, &parent, &path, Node::File {
            content: content.to_string(),
        });
    }

    pub fn is_dir(&self, path: &str) -> bool {
        normalize(path).is_some_and(|p| {
            matches!(self.inner.nodes.lock().get(&p), Some(Node::Directory { .. }))
        })
    }

    pub fn is_file(&self, path: &str) -> bool {
        normalize(path)
            .is_some_and(|p| matches!(self.inner.nodes.lock().get(&p), Some(Node::File { .. })))
    }

    pub fn file_content(&self, path: &str) -> Option<String> {
        let path = normalize(path)?;
        match self.inner.nodes.lock().get(&path) {
            Some(Node::File { content }) => Some(content.clone()),
            _ => None,
        }
    }

    /// Names of the entries directly below `path`, in storage order.
    pub fn children(&self, path: &str) -> Vec<String> {
        let Some(path) = normalize(path) else {
            return Vec::new();
        };
        match self.inner.nodes.lock().get(&path) {
            Some(Node::Directory { children }) => children.clone(),
            _ => Vec::new(),
        }
    }

    // ==================== Failure injection ====================

    /// Make [`Storage::root`] fail with [`StorageError::Unavailable`].
    pub fn fail_root(&self) {
        self.inner.faults.lock().root_unavailable = true;
    }

    /// Make [`Storage::resolve_location`] fail for `location`.
    pub fn fail_resolution(&self, location: &str) {
        self.inner
            .faults
            .lock()
            .unresolvable
            .insert(location.to_string());
    }

    /// Make enumeration of the directory at `path` fail after its first batch.
    pub fn fail_listing(&self, path: &str) {
        if let Some(path) = normalize(path) {
            self.inner.faults.lock().unreadable.insert(path);
        }
    }

    /// Deny every lookup, creation and IO on the entry at `path`.
    pub fn deny(&self, path: &str) {
        if let Some(path) = normalize(path) {
            self.inner.faults.lock().denied.insert(path);
        }
    }

    // ==================== Counters ====================

    pub fn root_calls(&self) -> usize {
        self.inner.counters.root_calls.load(Ordering::SeqCst)
    }

    pub fn resolve_calls(&self) -> usize {
        self.inner.counters.resolve_calls.load(Ordering::SeqCst)
    }

    pub fn directories_created(&self) -> usize {
        self.inner.counters.directories_created.load(Ordering::SeqCst)
    }

    pub fn files_created(&self) -> usize {
        self.inner.counters.files_created.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> usize {
        self.inner.counters.writes.load(Ordering::SeqCst)
    }

    // ==================== Internals ====================

    fn check_denied(&self, path: &str) -> Result<(), StorageError> {
        if self.inner.faults.lock().denied.contains(path) {
            return Err(StorageError::PermissionDenied {
                location: format!("{SCHEME}{path}"),
            });
        }
        Ok(())
    }

    fn child_path(&self, parent: &StorageHandle, name: &str) -> Result<String, StorageError> {
        let mut path = path_from_location(parent.location())?;
        for step in name_steps(name)? {
            match step {
                NameStep::Parent => {
                    path = parent_of(&path)
                        .ok_or_else(|| StorageError::NotFound {
                            location: format!("{}{name}", parent.location()),
                        })?
                        .to_string();
                }
                NameStep::Child(segment) => path = join(&path, segment),
            }
        }
        Ok(path)
    }

    /// Shared lookup-or-create for both entry kinds.
    fn child(
        &self,
        parent: &StorageHandle,
        name: &str,
        create: bool,
        kind: EntryKind,
    ) -> Result<StorageHandle, StorageError> {
        parent.expect_kind(EntryKind::Directory)?;
        let path = self.child_path(parent, name)?;
        self.check_denied(&path)?;

        let mut nodes = self.inner.nodes.lock();
        match (nodes.get(&path), kind) {
            (Some(Node::Directory { .. }), EntryKind::Directory)
            | (Some(Node::File { .. }), EntryKind::File) => return Ok(handle_for(&path, kind)),
            (Some(_), _) => {
                return Err(StorageError::TypeMismatch {
                    location: location_of(&path, kind),
                    expected: kind,
                });
            }
            (None, _) => {}
        }

        let not_found = || StorageError::NotFound {
            location: location_of(&path, kind),
        };
        if !create {
            return Err(not_found());
        }
        let parent_path = parent_of(&path).ok_or_else(not_found)?.to_string();
        if !matches!(nodes.get(&parent_path), Some(Node::Directory { .. })) {
            return Err(not_found());
        }

        let node = match kind {
            EntryKind::Directory => {
                self.inner
                    .counters
                    .directories_created
                    .fetch_add(1, Ordering::SeqCst);
                Node::Directory {
                    children: Vec::new(),
                }
            }
            EntryKind::File => {
                self.inner.counters.files_created.fetch_add(1, Ordering::SeqCst);
                Node::File {
                    content: String::new(),
                }
            }
        };
        insert_child(&mut nodes, &parent_path, &path, node);
        debug!(path = %path, kind = %kind, "Created entry");
        Ok(handle_for(&path, kind))
    }
}

fn ensure_dir(nodes: &mut HashMap<String, Node>, path: &str) {
    if matches!(nodes.get(path), Some(Node::Directory { .. })) {
        return;
    }
    if let Some(parent) = parent_of(path).map(str::to_string) {
        ensure_dir(nodes, &parent);
        insert_child(nodes, &parent, path, Node::Directory {
            children: Vec::new(),
        });
    }
}

fn insert_child(nodes: &mut HashMap<String, Node>, parent: &str, path: &str, node: Node) {
    let name = name_of(path).to_string();
    if let Some(Node::Directory { children }) = nodes.get_mut(parent) {
        if !children.contains(&name) {
            children.push(name);
        }
    }
    nodes.insert(path.to_string(), node);
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn root(&self) -> Result<StorageHandle, StorageError> {
        tokio::task::yield_now().await;
        self.inner.counters.root_calls.fetch_add(1, Ordering::SeqCst);
        if self.inner.faults.lock().root_unavailable {
            return Err(StorageError::Unavailable {
                reason: "memory storage root disabled".to_string(),
                source: None,
            });
        }
        let sandbox = self.inner.sandbox.clone();
        ensure_dir(&mut self.inner.nodes.lock(), &sandbox);
        Ok(handle_for(&sandbox, EntryKind::Directory))
    }

    #[instrument(level = "trace", skip(self))]
    async fn resolve_location(&self, location: &str) -> Result<StorageHandle, StorageError> {
        tokio::task::yield_now().await;
        self.inner.counters.resolve_calls.fetch_add(1, Ordering::SeqCst);
        if self.inner.faults.lock().unresolvable.contains(location) {
            return Err(StorageError::InvalidLocation {
                location: location.to_string(),
                reason: "resolution disabled".to_string(),
            });
        }

        let path = path_from_location(location)?;
        self.check_denied(&path)?;
        match self.inner.nodes.lock().get(&path) {
            Some(Node::Directory { .. }) => Ok(handle_for(&path, EntryKind::Directory)),
            Some(Node::File { .. }) => Ok(handle_for(&path, EntryKind::File)),
            None => Err(StorageError::NotFound {
                location: location.to_string(),
            }),
        }
    }

    async fn child_directory(
        &self,
        parent: &StorageHandle,
        name: &str,
        create: bool,
    ) -> Result<StorageHandle, StorageError> {
        tokio::task::yield_now().await;
        self.child(parent, name, create, EntryKind::Directory)
    }

    async fn child_file(
        &self,
        parent: &StorageHandle,
        name: &str,
        create: bool,
    ) -> Result<StorageHandle, StorageError> {
        tokio::task::yield_now().await;
        self.child(parent, name, create, EntryKind::File)
    }

    async fn read_text(&self, file: &StorageHandle) -> Result<String, StorageError> {
        tokio::task::yield_now().await;
        file.expect_kind(EntryKind::File)?;
        let path = path_from_location(file.location())?;
        self.check_denied(&path)?;
        match self.inner.nodes.lock().get(&path) {
            Some(Node::File { content }) => Ok(content.clone()),
            _ => Err(StorageError::NotFound {
                location: file.location().to_string(),
            }),
        }
    }

    async fn write_text(&self, file: &StorageHandle, data: &str) -> Result<(), StorageError> {
        tokio::task::yield_now().await;
        file.expect_kind(EntryKind::File)?;
        let path = path_from_location(file.location())?;
        self.check_denied(&path)?;
        match self.inner.nodes.lock().get_mut(&path) {
            Some(Node::File { content }) => {
                data.clone_into(content);
                self.inner.counters.writes.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
            _ => Err(StorageError::NotFound {
                location: file.location().to_string(),
            }),
        }
    }

    async fn open_reader(
        &self,
        dir: &StorageHandle,
    ) -> Result<Box<dyn DirectoryReader>, StorageError> {
        tokio::task::yield_now().await;
        dir.expect_kind(EntryKind::Directory)?;
        let path = path_from_location(dir.location())?;
        self.check_denied(&path)?;

        let entries = {
            let nodes = self.inner.nodes.lock();
            let Some(Node::Directory { children }) = nodes.get(&path) else {
                return Err(StorageError::NotFound {
                    location: dir.location().to_string(),
                });
            };
            children
                .iter()
                .filter_map(|name| {
                    let child = join(&path, name);
                    match nodes.get(&child) {
                        Some(Node::Directory { .. }) => {
                            Some(handle_for(&child, EntryKind::Directory))
                        }
                        Some(Node::File { .. }) => Some(handle_for(&child, EntryKind::File)),
                        None => None,
                    }
                })
                .collect::<Vec<_>>()
        };

        Ok(Box::new(MemoryDirectoryReader {
            entries: entries.into_iter(),
            batch_size: self.batch_size,
            fail_after_first: self.inner.faults.lock().unreadable.contains(&path),
            batches_served: 0,
            location: dir.location().to_string(),
        }))
    }
}

struct MemoryDirectoryReader {
    entries: std::vec::IntoIter<StorageHandle>,
    batch_size: usize,
    fail_after_first: bool,
    batches_served: usize,
    location: String,
}

#[async_trait]
impl DirectoryReader for MemoryDirectoryReader {
    async fn next_batch(&mut self) -> Result<Vec<StorageHandle>, StorageError> {
        tokio::task::yield_now().await;
        if self.fail_after_first && self.batches_served > 0 {
            return Err(StorageError::Io {
                location: self.location.clone(),
                source: std::io::Error::other("injected enumeration failure"),
            });
        }
        self.batches_served += 1;
        Ok(self.entries.by_ref().take(self.batch_size).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("/a//b/./c/").as_deref(), Some("/a/b/c"));
        assert_eq!(normalize("/a/../b").as_deref(), Some("/b"));
        assert_eq!(normalize("/").as_deref(), Some("/"));
        assert_eq!(normalize("/.."), None);
    }

    #[test]
    fn test_locations() {
        assert_eq!(location_of("/", EntryKind::Directory), "mem:///");
        assert_eq!(location_of("/a/b", EntryKind::Directory), "mem:///a/b/");
        assert_eq!(location_of("/a/b.txt", EntryKind::File), "mem:///a/b.txt");
        assert_eq!(path_from_location("mem:///a/b/").unwrap(), "/a/b");
        assert!(path_from_location("file:///a").is_err());
    }

    #[test]
    fn test_parent_and_name() {
        assert_eq!(parent_of("/a/b"), Some("/a"));
        assert_eq!(parent_of("/a"), Some("/"));
        assert_eq!(parent_of("/"), None);
        assert_eq!(name_of("/a/b"), "b");
        assert_eq!(name_of("/"), "/");
    }

    #[test]
    fn test_seeding_preserves_insertion_order() {
        let storage = MemoryStorage::new();
        storage.insert_file("/persistent/zeta.txt", "z");
        storage.insert_dir("/persistent/alpha");
        storage.insert_file("/persistent/mid.txt", "m");
        assert_eq!(storage.children("/persistent"), vec!["zeta.txt", "alpha", "mid.txt"]);
    }

    #[tokio::test]
    async fn test_root_and_parent() {
        let storage = MemoryStorage::new();
        let root = storage.root().await.unwrap();
        assert_eq!(root.location(), "mem:///persistent/");

        let parent = storage.child_directory(&root, "../", false).await.unwrap();
        assert_eq!(parent.location(), "mem:///");

        let top = MemoryStorage::with_sandbox("/");
        let top_root = top.root().await.unwrap();
        assert!(top.child_directory(&top_root, "../", false).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_create_is_idempotent() {
        let storage = MemoryStorage::new();
        let root = storage.root().await.unwrap();
        let first = storage.child_directory(&root, "notes", true).await.unwrap();
        let second = storage.child_directory(&root, "notes", true).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(storage.directories_created(), 1);
    }

    #[tokio::test]
    async fn test_type_mismatch() {
        let storage = MemoryStorage::new();
        storage.insert_file("/persistent/taken", "");
        let root = storage.root().await.unwrap();
        assert!(matches!(
            storage.child_directory(&root, "taken", true).await,
            Err(StorageError::TypeMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn test_batch_size_keeps_shared_state() {
        let storage = MemoryStorage::new();
        storage.insert_file("/persistent/a", "");
        storage.insert_file("/persistent/b", "");
        storage.fail_root();

        let small = storage.clone().with_batch_size(1);
        assert_eq!(storage.children("/persistent"), vec!["a", "b"]);
        assert_eq!(small.children("/persistent"), vec!["a", "b"]);
        assert!(small.root().await.is_err());
        assert_eq!(storage.root_calls(), 1);

        let dir = handle_for("/persistent", EntryKind::Directory);
        let mut reader = small.open_reader(&dir).await.unwrap();
        assert_eq!(reader.next_batch().await.unwrap().len(), 1);
        let mut reader = storage.open_reader(&dir).await.unwrap();
        assert_eq!(reader.next_batch().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_reader_failure_after_first_batch() {
        let storage = MemoryStorage::new().with_batch_size(1);
        storage.insert_file("/persistent/a", "");
        storage.insert_file("/persistent/b", "");
        storage.fail_listing("/persistent");
        let root = storage.root().await.unwrap();

        let mut reader = storage.open_reader(&root).await.unwrap();
        assert_eq!(reader.next_batch().await.unwrap().len(), 1);
        assert!(reader.next_batch().await.is_err());
    }
}
