//! Stable exit codes for agent CLI commands.

/// Command succeeded.
pub const OK: i32 = 0;
/// Command failed: bad input, launch failure, missing response, I/O errors.
pub const INVALID: i32 = 1;
/// The referenced run id does not exist.
pub const NOT_FOUND: i32 = 3;
