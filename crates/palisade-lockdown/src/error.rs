//! Error types for the lockdown crate.

use thiserror::Error;

/// Errors from lockdown state persistence.
///
/// These never block message processing: callers log and continue with the
/// in-memory state (losing a persisted transition is preferable to failing
/// the kill switch itself).
#[derive(Debug, Error)]
pub enum LockdownError {
    /// State file could not be read or written.
    #[error("lockdown state I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// State file contents could not be (de)serialized.
    #[error("lockdown state format error: {0}")]
    Format(#[from] serde_json::Error),
}

/// Result alias for lockdown operations.
pub type Result<T> = std::result::Result<T, LockdownError>;
