//! Configuration tree for the guard pipeline.
//!
//! Composed from the per-layer option structs in `palisade-guard`; every
//! default is the secure configuration (all layers on, shipped thresholds).
//! Supplied by the host's config loader — this crate does not read config
//! files itself.

use serde::{Deserialize, Serialize};

pub use palisade_guard::{
    AdvancedOptions, BoundaryOptions, CleanOptions, EgressOptions, EntropyOptions,
    HeuristicsOptions, PatternOptions, PerplexityOptions, SemanticOptions,
};
pub use palisade_lockdown::LockdownConfig;

/// Full guard pipeline configuration. Immutable per pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardConfig {
    /// Master switch: when false, the pipeline passes everything through.
    pub enabled: bool,

    pub clean: CleanOptions,
    pub patterns: PatternOptions,
    pub advanced: AdvancedOptions,
    pub perplexity: PerplexityOptions,
    pub boundary: BoundaryOptions,
    pub entropy: EntropyOptions,
    pub heuristics: HeuristicsOptions,
    pub semantic: SemanticOptions,
    pub egress: EgressOptions,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            clean: CleanOptions::default(),
            patterns: PatternOptions::default(),
            advanced: AdvancedOptions::default(),
            perplexity: PerplexityOptions::default(),
            boundary: BoundaryOptions::default(),
            entropy: EntropyOptions::default(),
            heuristics: HeuristicsOptions::default(),
            semantic: SemanticOptions::default(),
            egress: EgressOptions::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_fully_armed() {
        let config = GuardConfig::default();
        assert!(config.enabled);
        assert!(config.patterns.enabled);
        assert!(config.advanced.enabled);
        assert!(config.perplexity.enabled);
        assert!(config.boundary.enabled);
        assert!(config.entropy.enabled);
        assert!(config.heuristics.enabled);
        assert!(config.semantic.enabled);
        assert!(config.egress.enabled);
    }

    #[test]
    fn test_config_serialization_round_trip() {
        let config = GuardConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: GuardConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.clean.max_input_length, config.clean.max_input_length);
        assert!((parsed.semantic.threshold - 0.77).abs() < f64::EPSILON);
    }
}
