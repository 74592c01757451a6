//! Directory listings for tree widgets.
//!
//! A listing is the immediate children of one directory, each turned into a
//! [`ListingNode`] whose `id` is derived from the entry's location string.
//! Ids are content-addressed rather than positional so that a widget can
//! reconcile its expanded/selected state across refreshes and restarts.
//!
//! When listing the root with navigation enabled, a synthetic `..` node
//! pointing at the root's parent is placed first. If the parent cannot be
//! resolved (e.g. the root is the top of the filesystem) the node is simply
//! left out.

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, instrument, trace, warn};

use crate::storage::{Storage, StorageError, StorageHandle};

/// Id of the up-navigation node.
pub const UP_NODE_ID: &str = "__up";

/// Display name of the up-navigation node.
pub const UP_NODE_NAME: &str = "..";

/// Relative name used to reach the root's parent.
const PARENT_PATH: &str = "../";

/// Errors from building a listing.
#[derive(Debug, Error)]
pub enum ListingError {
    /// Enumeration of a directory failed. Entries read before the failure are discarded.
    #[error("Failed to list directory '{directory}': {source}")]
    Read {
        directory: String,
        #[source]
        source: StorageError,
    },
}

/// One row of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListingNode {
    pub display_name: String,
    pub id: String,
    pub handle: StorageHandle,
    /// Whether the widget should offer to expand this node.
    pub is_container: bool,
    pub selectable: bool,
    pub is_up_navigation: bool,
}

impl ListingNode {
    fn entry(handle: StorageHandle) -> Self {
        Self {
            display_name: handle.name().to_string(),
            id: node_id(handle.location()),
            is_container: handle.is_directory(),
            selectable: false,
            is_up_navigation: false,
            handle,
        }
    }

    fn up(parent: StorageHandle) -> Self {
        Self {
            display_name: UP_NODE_NAME.to_string(),
            id: UP_NODE_ID.to_string(),
            is_container: parent.is_directory(),
            selectable: false,
            is_up_navigation: true,
            handle: parent,
        }
    }
}

/// Stable id for the entry at `location`: lowercase hex MD5 of the location string.
///
/// ```
/// use oxnav_core::listing::node_id;
///
/// assert_eq!(node_id("mem:///a/"), node_id("mem:///a/"));
/// assert_ne!(node_id("mem:///a/"), node_id("mem:///b/"));
/// assert_eq!(node_id("").len(), 32);
/// ```
pub fn node_id(location: &str) -> String {
    format!("{:x}", md5::compute(location.as_bytes()))
}

/// List the immediate children of `dir`.
///
/// With `nav_enabled` and `dir` equal to `root`, the result starts with an
/// up-navigation node when the root's parent resolves. Children follow in
/// the order the storage delivers them; nothing is sorted. All reader
/// batches are consumed before returning.
#[instrument(level = "debug", skip(storage, dir, root), fields(dir = %dir.location(), root = %root.location()))]
pub async fn list_children(
    storage: &dyn Storage,
    dir: &StorageHandle,
    nav_enabled: bool,
    root: &StorageHandle,
) -> Result<Vec<ListingNode>, ListingError> {
    let mut nodes = Vec::new();

    if nav_enabled && dir == root {
        match storage.child_directory(root, PARENT_PATH, false).await {
            Ok(parent) => {
                trace!(parent = %parent.location(), "Adding up-navigation node");
                nodes.push(ListingNode::up(parent));
            }
            Err(e) => warn!(error = %e, "Unable to resolve parent directory"),
        }
    }

    let list_err = |source| ListingError::Read {
        directory: dir.location().to_string(),
        source,
    };

    let mut reader = storage.open_reader(dir).await.map_err(list_err)?;
    let mut entries = Vec::new();
    let mut batches = 0usize;
    loop {
        let batch = reader.next_batch().await.map_err(list_err)?;
        if batch.is_empty() {
            break;
        }
        batches += 1;
        entries.extend(batch);
    }

    nodes.extend(entries.into_iter().map(ListingNode::entry));
    debug!(count = nodes.len(), batches = batches, "Listed directory");
    Ok(nodes)
}
