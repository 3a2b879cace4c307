//! # Palisade Lockdown — Emergency Kill Switch
//!
//! Independent state machine that ingests block events from the guard
//! pipeline, auto-trips a global kill switch when block velocity indicates
//! an active attack, and auto-recovers after a fixed cooldown — surviving
//! process restarts.
//!
//! ## Threat Model
//!
//! A single blocked payload is routine. Ten blocked payloads in a minute is
//! a campaign: an attacker iterating on bypasses, or an automated fuzzer.
//! At that point the cheapest correct move is to stop answering entirely
//! for a few minutes.
//!
//! ## Security Notes
//!
//! - State transitions persist synchronously; a crash cannot shed an
//!   active lockdown.
//! - The recovery timer is reconstructed from the persisted activation
//!   timestamp at startup — never trusted to memory alone.
//! - Persistence failures are logged and swallowed: the in-memory switch
//!   keeps protecting even when the disk does not cooperate.

mod breaker;
mod error;
mod state;

pub use breaker::{
    CheckResult, CircuitBreaker, LockdownObserver, LockdownStatus, RECOVERY_COOLDOWN,
    VELOCITY_WINDOW,
};
pub use error::{LockdownError, Result};
pub use state::{LockdownConfig, StateStore};
