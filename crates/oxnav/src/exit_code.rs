//! Exit codes for the CLI.
//!
//! These follow common Unix conventions and provide meaningful
//! status information for scripting and automation.

/// Successful execution
pub const SUCCESS: u8 = 0;

/// General/unspecified error
pub const GENERAL_ERROR: u8 = 1;

/// Command-line usage error (bad or missing arguments)
pub const USAGE_ERROR: u8 = 2;

/// Permission denied by the storage backend
pub const PERMISSION_DENIED: u8 = 5;

/// File or directory not found
pub const NOT_FOUND: u8 = 7;
