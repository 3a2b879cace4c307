//! Statistical and semantic detection layers.
//!
//! Each layer is a pure function of `(text, threshold)` returning the
//! uniform [`LayerResult`] contract — except the semantic layer, which is
//! async and holds shared initialization state.

pub mod boundary;
pub mod entropy;
pub mod heuristics;
pub mod perplexity;
pub mod semantic;

use serde_json::Value;

/// The uniform result contract every detection layer returns.
///
/// Invariant: if `blocked` is true, `reason` is present.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerResult {
    pub blocked: bool,
    /// Layer-specific numeric score (perplexity, entropy bits/char, etc.).
    pub score: f64,
    /// Human-readable block reason. Present iff `blocked`.
    pub reason: Option<String>,
    /// Optional structured detail for audit logs.
    pub metadata: Option<Value>,
}

impl LayerResult {
    /// An unblocked result carrying only a score.
    pub fn pass(score: f64) -> Self {
        Self {
            blocked: false,
            score,
            reason: None,
            metadata: None,
        }
    }

    /// A blocking result. `reason` is mandatory by construction.
    pub fn block(score: f64, reason: impl Into<String>) -> Self {
        Self {
            blocked: true,
            score,
            reason: Some(reason.into()),
            metadata: None,
        }
    }

    /// Attach structured metadata.
    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}
