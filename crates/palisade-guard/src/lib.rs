//! # Palisade Guard — Multi-Layer Detection Pipeline
//!
//! Layered, LLM-free prompt-injection detection and content sanitization.
//! Each layer is a pure function of `(text, options)`; the orchestrator in
//! `palisade-core` sequences them and owns all shared state.
//!
//! ## Layers (in pipeline order)
//!
//! | Layer | Kind | Defends against |
//! |-------|------|-----------------|
//! | [`clean`] | Mutating | Invisible chars, bidi tricks, homoglyph spoofing, oversize payloads |
//! | [`detect`] | Read-only | Injection phrasing, template expressions, dangerous URI schemes |
//! | [`advanced`] | Read-only | Homoglyph concentration, encoder calls, multilingual injection, delimiter tokens |
//! | [`layers::perplexity`] | Read-only | Gibberish / adversarial-suffix token statistics |
//! | [`layers::boundary`] | Read-only | Conversation-control token smuggling |
//! | [`layers::entropy`] | Read-only | Encrypted/encoded payloads |
//! | [`layers::heuristics`] | Read-only | Weak signals that only matter combined |
//! | [`layers::semantic`] | Async, fail-open | Paraphrased attacks via embedding similarity |
//! | [`egress`] | Outbound | Secret/PII leakage (redact-only) |
//!
//! ## References
//!
//! - **OWASP LLM Top 10** — LLM01 Prompt Injection taxonomy.
//!   <https://owasp.org/www-project-top-10-for-large-language-model-applications/>
//! - **Unicode TR39** — confusable characters and security mechanisms.
//!   <https://www.unicode.org/reports/tr39/>
//! - **Zou et al. (2023)** — adversarial suffixes and their statistical
//!   signature. <https://arxiv.org/abs/2307.15043>

pub mod advanced;
pub mod clean;
pub mod config;
pub mod detect;
pub mod egress;
pub mod layers;
pub mod patterns;

pub use advanced::{advanced, AdvancedResult};
pub use clean::{clean, CleanResult};
pub use config::{
    AdvancedOptions, BoundaryOptions, CleanOptions, EgressOptions, EntropyOptions,
    HeuristicsOptions, PatternOptions, PerplexityOptions, SemanticOptions,
};
pub use detect::{detect, DetectResult};
pub use egress::{guard_egress, EgressResult};
pub use layers::boundary::detect_boundary;
pub use layers::entropy::detect_entropy;
pub use layers::heuristics::detect_heuristics;
pub use layers::perplexity::detect_perplexity;
pub use layers::semantic::{AttackCorpus, EmbeddingProvider, SemanticError, SemanticLayer};
pub use layers::LayerResult;
