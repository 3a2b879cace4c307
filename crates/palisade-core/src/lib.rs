//! # Palisade Core
//!
//! Unified content-defense facade: orchestrates the multi-layer guard
//! pipeline and the lockdown circuit breaker.
//!
//! ## Threat Coverage
//!
//! | Layer | Component | Threats Blocked |
//! |-------|-----------|-----------------|
//! | Inbound | Guard pipeline | Prompt injection, obfuscation, encoded payloads |
//! | Outbound | Egress filter | Secret/PII leakage (redacted, not blocked) |
//! | Systemic | Lockdown breaker | Sustained attack campaigns (velocity kill switch) |
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       PALISADE CORE                          │
//! │                                                              │
//! │   inbound text ──▶ ┌───────────┐      ┌──────────────────┐   │
//! │                    │   Guard   │─────▶│  Circuit Breaker │   │
//! │                    │ (8 layers)│ block│  (kill switch)   │   │
//! │                    └─────┬─────┘ event└──────────────────┘   │
//! │                          │                                   │
//! │                          ▼                                   │
//! │                 allow / block + audit                        │
//! │                                                              │
//! │   outbound text ──▶ ┌────────────┐                           │
//! │                     │   Egress   │──▶ redacted text          │
//! │                     └────────────┘                           │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use palisade_core::{Guard, GuardConfig, StatsStore};
//! use palisade_lockdown::{CircuitBreaker, StateStore};
//!
//! # async fn demo() {
//! let store = StateStore::new("lockdown.json");
//! let breaker = CircuitBreaker::new(store.load().unwrap_or_default(), store);
//!
//! let guard = Guard::new(GuardConfig::default())
//!     .with_stats_store(StatsStore::new("guard_stats.json"))
//!     .with_breaker(Arc::clone(&breaker));
//!
//! let result = guard.run_guard("user message here").await;
//! if result.blocked {
//!     eprintln!("blocked: {}", result.reason.unwrap());
//! }
//! # }
//! ```
//!
//! ## Security Notes
//!
//! - Layers execute in a fixed order; the first block short-circuits.
//! - Every block feeds the breaker's sliding window; a burst trips the
//!   global kill switch.
//! - The semantic layer is fail-open; everything else never throws on
//!   well-formed input.

mod audit;
mod config;
mod error;
mod guard;
mod result;
mod stats;

pub use audit::{lockdown_audit_observer, AuditSink, Feature, Severity, TracingAudit};
pub use config::{
    AdvancedOptions, BoundaryOptions, CleanOptions, EgressOptions, EntropyOptions, GuardConfig,
    HeuristicsOptions, LockdownConfig, PatternOptions, PerplexityOptions, SemanticOptions,
};
pub use error::CoreError;
pub use guard::Guard;
pub use result::{FeatureStatus, GateDecision, GuardResult};
pub use stats::{GuardStats, StatsStore};

// Re-export component types for convenience
pub use palisade_guard::{EgressResult, EmbeddingProvider, LayerResult, SemanticError};
pub use palisade_lockdown::{CheckResult, CircuitBreaker, LockdownStatus, StateStore as LockdownStateStore};
