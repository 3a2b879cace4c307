//! Guard decision counters with synchronous file persistence.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::CoreError;

/// Monotonic decision counters. Loaded at startup, flushed after every
/// decision.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardStats {
    pub blocked: u64,
    pub allowed: u64,
}

/// Optional JSON-file store for [`GuardStats`]. Without a path, counters
/// are in-memory only.
#[derive(Debug, Clone, Default)]
pub struct StatsStore {
    path: Option<PathBuf>,
}

impl StatsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    /// In-memory store: load yields zeros, save is a no-op.
    pub fn ephemeral() -> Self {
        Self { path: None }
    }

    /// Load persisted counters. Absent path or file yields zeros.
    pub fn load(&self) -> Result<GuardStats, CoreError> {
        let Some(path) = &self.path else {
            return Ok(GuardStats::default());
        };
        if !path.exists() {
            return Ok(GuardStats::default());
        }
        let data = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }

    /// Flush counters synchronously.
    pub fn save(&self, stats: &GuardStats) -> Result<(), CoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let data = serde_json::to_string(stats)?;
        std::fs::write(path, data)?;
        Ok(())
    }
}
