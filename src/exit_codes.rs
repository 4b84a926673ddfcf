//! Stable exit codes for the kickstack CLI.

/// Every file was created, overwritten or skipped.
pub const OK: i32 = 0;
/// At least one file reported a failure.
pub const FILE_FAILED: i32 = 1;
/// Arguments or configuration overrides were rejected before anything was written.
pub const INVALID_ARGUMENT: i32 = 2;
