//! Error types for Palisade Core.

use thiserror::Error;

/// Core error type for orchestrator operations.
///
/// Persistence errors surface here but are swallowed (logged) at the
/// pipeline boundary: losing a stats increment must never block or crash
/// message processing.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Stats file could not be read or written.
    #[error("stats persistence error: {0}")]
    Stats(#[from] std::io::Error),

    /// Stats file contents could not be (de)serialized.
    #[error("stats format error: {0}")]
    StatsFormat(#[from] serde_json::Error),

    /// Lockdown error passthrough.
    #[error("lockdown error: {0}")]
    Lockdown(#[from] palisade_lockdown::LockdownError),
}
