//! Asynchronous file navigation over a handle-based storage capability.
//!
//! The entry point is [`FileController`]: it resolves a root directory once
//! (honouring a remembered root from [`Preferences`]), then resolves logical
//! `/`-separated paths against it, creating missing directories and files,
//! and builds tree-widget listings with stable node ids.

pub mod controller;
pub mod error;
pub mod file;
pub mod listing;
pub mod navigator;
pub mod path;
pub mod prefs;
pub mod root;
pub mod storage;

// Re-export commonly used types at crate root
pub use controller::{FileController, InitResult, NavError};
pub use listing::{ListingNode, UP_NODE_ID, UP_NODE_NAME, node_id};
pub use navigator::ResolvedFile;
pub use path::PathRequest;
pub use prefs::{JsonPreferences, MemoryPreferences, Preferences, ROOT_LOCATION_KEY};
pub use root::{InitStatus, RootSource, RootState};
pub use storage::{EntryKind, LocalStorage, MemoryStorage, Storage, StorageHandle};
