//! Exit codes of the `conex` binary
//!
//! Clap exits with 2 on its own for malformed command lines.

/// General error - unspecified failure
pub const ERROR: i32 = 1;

/// Input error - bad flag combination, reference, property or document
pub const INPUT_ERROR: i32 = 2;

/// Server error - Artifactory or Status Page refused the request
pub const SERVER_ERROR: i32 = 3;

/// Configuration error - unknown or duplicate profile, unreadable profile file
pub const CONFIG_ERROR: i32 = 4;

/// IO error - file not found, permission denied, etc.
pub const IO_ERROR: i32 = 5;
