//! Per-layer option structs.
//!
//! Each detection phase takes its own options struct so layers stay pure
//! functions of `(text, options)`. Defaults are the secure configuration:
//! every toggle on, shipped thresholds. The orchestrator crate composes
//! these into its full config tree.

use serde::{Deserialize, Serialize};

/// Options for the cleaning phase (normalization + sanitization).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanOptions {
    /// Apply Unicode NFKC normalization.
    pub unicode_normalize: bool,
    /// Strip zero-width, bidi, variation-selector, and tag characters.
    pub invisible_strip: bool,
    /// Strip ANSI escapes and C0 control characters (except `\n`/`\t`).
    pub control_strip: bool,
    /// Normalize `\r\n` and `\r` to `\n`.
    pub newline_normalize: bool,
    /// Fold confusable characters (Cyrillic/Greek/etc.) to Latin.
    pub homoglyph_normalize: bool,
    /// Maximum input length in chars; enforced on the final text.
    pub max_input_length: usize,
}

impl Default for CleanOptions {
    fn default() -> Self {
        Self {
            unicode_normalize: true,
            invisible_strip: true,
            control_strip: true,
            newline_normalize: true,
            homoglyph_normalize: true,
            max_input_length: 100_000,
        }
    }
}

/// Options for the pattern-matching phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternOptions {
    pub enabled: bool,
    /// Scan for injection phrasing (whitespace-collapsed).
    pub injection: bool,
    /// Block template-engine expressions.
    pub templates: bool,
    /// Block dangerous URI schemes.
    pub schemes: bool,
}

impl Default for PatternOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            injection: true,
            templates: true,
            schemes: true,
        }
    }
}

/// Options for the advanced analysis phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvancedOptions {
    pub enabled: bool,
    /// Compute the homoglyph concentration score.
    pub homoglyph_score: bool,
    /// Homoglyph score (0-1) at or above which the input is blocked.
    pub homoglyph_block_threshold: f64,
    /// Detect encode/decode function calls (warning-only).
    pub encoding_detect: bool,
    /// Scan for injection phrasing in non-English languages.
    pub multilingual_scan: bool,
    /// Block LLM conversation-control tokens.
    pub delimiter_fence: bool,
}

impl Default for AdvancedOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            homoglyph_score: true,
            homoglyph_block_threshold: 0.3,
            encoding_detect: true,
            multilingual_scan: true,
            delimiter_fence: true,
        }
    }
}

/// Options for the perplexity layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerplexityOptions {
    pub enabled: bool,
    /// Perplexity above which the input is blocked.
    pub threshold: f64,
}

impl Default for PerplexityOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: 2000.0,
        }
    }
}

/// Options for the boundary-token layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundaryOptions {
    pub enabled: bool,
}

impl Default for BoundaryOptions {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Options for the entropy layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntropyOptions {
    pub enabled: bool,
}

impl Default for EntropyOptions {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Options for the behavioral heuristics layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeuristicsOptions {
    pub enabled: bool,
    /// Accumulated score at or above which the input is blocked.
    pub threshold: u32,
}

impl Default for HeuristicsOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: 100,
        }
    }
}

/// Options for the semantic similarity layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemanticOptions {
    pub enabled: bool,
    /// Cosine similarity above which the input is blocked.
    pub threshold: f64,
}

impl Default for SemanticOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: 0.77,
        }
    }
}

/// Options for the egress (outbound) filter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EgressOptions {
    pub enabled: bool,
    /// Redact secrets and PII from outbound text.
    pub redact_secrets: bool,
}

impl Default for EgressOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            redact_secrets: true,
        }
    }
}
