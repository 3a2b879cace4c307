//! Persisted lockdown state.
//!
//! The kill switch must survive process restarts: an attacker who can crash
//! the host must not escape an active lockdown. State is a single JSON file
//! written on every transition and read back at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Durable lockdown state.
///
/// Invariant: `locked_at` and `locked_by` are present iff `active`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockdownConfig {
    /// Whether the kill switch is engaged.
    pub active: bool,

    /// Whether block velocity may trip the switch automatically.
    pub auto_trigger: bool,

    /// Blocks within the sliding window required to auto-trip.
    pub auto_trigger_threshold: usize,

    /// RFC3339 activation timestamp. Present iff `active`.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub locked_at: Option<String>,

    /// Who or what activated the lockdown. Present iff `active`.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub locked_by: Option<String>,
}

impl Default for LockdownConfig {
    fn default() -> Self {
        Self {
            active: false,
            auto_trigger: true,
            auto_trigger_threshold: 10,
            locked_at: None,
            locked_by: None,
        }
    }
}

/// JSON-file store for [`LockdownConfig`].
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load persisted state. An absent file yields the default config.
    pub fn load(&self) -> Result<LockdownConfig> {
        if !self.path.exists() {
            return Ok(LockdownConfig::default());
        }
        let data = std::fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&data)?)
    }

    /// Persist state, synchronously.
    pub fn save(&self, config: &LockdownConfig) -> Result<()> {
        let data = serde_json::to_string_pretty(config)?;
        std::fs::write(&self.path, data)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = LockdownConfig::default();
        assert!(!config.active);
        assert!(config.auto_trigger);
        assert_eq!(config.auto_trigger_threshold, 10);
        assert!(config.locked_at.is_none());
    }

    #[test]
    fn test_absent_file_loads_default() {
        let dir = TempDir::new().unwrap();
        let store = StateStore::new(dir.path().join("lockdown.json"));
        assert_eq!(store.load().unwrap(), LockdownConfig::default());
    }

    #[test]
    fn test_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = StateStore::new(dir.path().join("lockdown.json"));

        let config = LockdownConfig {
            active: true,
            auto_trigger: true,
            auto_trigger_threshold: 10,
            locked_at: Some("2025-06-01T12:00:00+00:00".to_owned()),
            locked_by: Some("operator".to_owned()),
        };
        store.save(&config).unwrap();
        assert_eq!(store.load().unwrap(), config);
    }

    #[test]
    fn test_inactive_state_omits_lock_fields() {
        let dir = TempDir::new().unwrap();
        let store = StateStore::new(dir.path().join("lockdown.json"));
        store.save(&LockdownConfig::default()).unwrap();

        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert!(!raw.contains("locked_at"));
        assert!(!raw.contains("locked_by"));
    }
}
