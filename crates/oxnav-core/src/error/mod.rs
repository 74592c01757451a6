//! Error types for the navigator crate
//!
//! Every error type lives next to the code that produces it; this module
//! collects them in one place.

pub use crate::controller::NavError;
pub use crate::file::WriteError;
pub use crate::listing::ListingError;
pub use crate::navigator::{PathResolutionError, ResolutionStep};
pub use crate::prefs::PreferenceError;
pub use crate::root::{InitError, RootResolutionFailed};
pub use crate::storage::StorageError;
