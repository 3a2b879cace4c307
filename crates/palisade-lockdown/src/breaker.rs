//! # Velocity Circuit Breaker
//!
//! Emergency kill switch with two states: **Standby** and **Active**. While
//! active, [`CircuitBreaker::check`] denies everything.
//!
//! ## Auto-trigger
//!
//! The guard reports every block here. Timestamps land in a 60-second
//! sliding window; when the window reaches the configured threshold the
//! breaker trips — a burst of blocked payloads means an active attack, and
//! slow-and-steady probing should not accumulate forever.
//!
//! ## Auto-recovery, restart-safe
//!
//! Activation schedules a single-shot deactivation after a fixed 5-minute
//! cooldown. The in-memory timer does not survive a crash, so the
//! activation timestamp is persisted and every startup reconstructs the
//! timer from it: a stale lock (cooldown already elapsed) is cleared
//! immediately, a fresh one gets a new timer for the *remaining* cooldown.

use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::state::{LockdownConfig, StateStore};

/// Sliding window over which block velocity is measured.
pub const VELOCITY_WINDOW: Duration = Duration::from_secs(60);

/// Cooldown after which an auto-recovering lockdown deactivates.
pub const RECOVERY_COOLDOWN: Duration = Duration::from_secs(5 * 60);

/// Outcome of a lockdown check.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckResult {
    pub allowed: bool,
    /// Present iff denied; embeds activation time and actor.
    pub reason: Option<String>,
    /// Operator hint, present iff denied.
    pub suggestion: Option<String>,
}

/// Point-in-time breaker state for status reporting.
#[derive(Debug, Clone, serde::Serialize)]
pub struct LockdownStatus {
    pub active: bool,
    pub auto_trigger: bool,
    pub auto_trigger_threshold: usize,
    pub triggered_count: u64,
    pub locked_at: Option<String>,
    pub locked_by: Option<String>,
}

/// Observer for lockdown state transitions (audit hook).
pub trait LockdownObserver: Send + Sync {
    fn lockdown_changed(&self, active: bool, triggered_by: Option<&str>);
}

struct Inner {
    config: LockdownConfig,
    recent_blocks: VecDeque<Instant>,
    triggered_count: u64,
}

/// The kill-switch state machine. Construct with [`CircuitBreaker::new`];
/// methods are safe to call from concurrent pipeline runs.
pub struct CircuitBreaker {
    inner: Mutex<Inner>,
    store: StateStore,
    timer: Mutex<Option<JoinHandle<()>>>,
    observer: Mutex<Option<Arc<dyn LockdownObserver>>>,
}

impl CircuitBreaker {
    /// Create a breaker from host-supplied (persisted) config and perform
    /// restart recovery.
    ///
    /// Must be called within a tokio runtime: recovery may arm a timer.
    pub fn new(config: LockdownConfig, store: StateStore) -> Arc<Self> {
        let breaker = Arc::new(Self {
            inner: Mutex::new(Inner {
                config,
                recent_blocks: VecDeque::new(),
                triggered_count: 0,
            }),
            store,
            timer: Mutex::new(None),
            observer: Mutex::new(None),
        });
        breaker.recover_from_restart();
        breaker
    }

    /// Install an observer for state transitions.
    pub fn set_observer(&self, observer: Arc<dyn LockdownObserver>) {
        *self.observer.lock().expect("observer lock") = Some(observer);
    }

    /// Re-evaluate a persisted Active state after a restart. The recovery
    /// timer died with the previous process; rebuild it from `locked_at`.
    fn recover_from_restart(self: &Arc<Self>) {
        let (active, locked_at) = {
            let inner = self.inner.lock().expect("breaker lock");
            (inner.config.active, inner.config.locked_at.clone())
        };
        if !active {
            return;
        }

        let elapsed = locked_at
            .as_deref()
            .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
            .map(|t| (Utc::now() - t.with_timezone(&Utc)).to_std().unwrap_or_default());

        match elapsed {
            Some(elapsed) if elapsed < RECOVERY_COOLDOWN => {
                let remaining = RECOVERY_COOLDOWN - elapsed;
                info!(
                    "lockdown still active after restart, re-arming recovery timer ({}s remaining)",
                    remaining.as_secs()
                );
                self.arm_timer(remaining);
            }
            _ => {
                // Stale lock from a previous session, or unreadable timestamp
                info!("clearing stale lockdown from previous session");
                self.deactivate();
            }
        }
    }

    /// Guard hook: called whenever the pipeline blocks a payload.
    ///
    /// No-op when already active or auto-trigger is disabled. Otherwise the
    /// block lands in the sliding window; reaching the threshold trips the
    /// breaker and clears the window.
    pub fn report_block_event(self: &Arc<Self>, reason: &str) {
        let fired = {
            let mut inner = self.inner.lock().expect("breaker lock");
            if inner.config.active || !inner.config.auto_trigger {
                return;
            }

            let now = Instant::now();
            inner.recent_blocks.push_back(now);
            while let Some(&front) = inner.recent_blocks.front() {
                if now.duration_since(front) > VELOCITY_WINDOW {
                    inner.recent_blocks.pop_front();
                } else {
                    break;
                }
            }

            debug!(
                "block reported ({}); window size {}",
                reason,
                inner.recent_blocks.len()
            );

            if inner.recent_blocks.len() >= inner.config.auto_trigger_threshold {
                let count = inner.recent_blocks.len();
                inner.recent_blocks.clear();
                Some(count)
            } else {
                None
            }
        };

        if let Some(count) = fired {
            self.activate(
                &format!("Velocity Circuit Breaker ({} blocks in 60s)", count),
                true,
            );
        }
    }

    /// Engage the kill switch. Records and persists timestamp/actor, cancels
    /// any pending recovery timer, and — when `auto_recover` — schedules
    /// deactivation after [`RECOVERY_COOLDOWN`].
    pub fn activate(self: &Arc<Self>, triggered_by: &str, auto_recover: bool) {
        let timestamp = Utc::now().to_rfc3339();
        {
            let mut inner = self.inner.lock().expect("breaker lock");
            inner.config.active = true;
            inner.config.locked_at = Some(timestamp.clone());
            inner.config.locked_by = Some(triggered_by.to_owned());
            inner.triggered_count += 1;
            self.persist(&inner.config);
        }
        warn!("LOCKDOWN ACTIVATED by {} at {}", triggered_by, timestamp);
        self.notify(true, Some(triggered_by));

        self.cancel_timer();
        if auto_recover {
            self.arm_timer(RECOVERY_COOLDOWN);
        }
    }

    /// Disengage the kill switch: clears the active flag and persisted
    /// timestamp/actor, empties the sliding window, cancels any timer.
    pub fn deactivate(&self) {
        let was_active = {
            let mut inner = self.inner.lock().expect("breaker lock");
            let was_active = inner.config.active;
            inner.config.active = false;
            inner.config.locked_at = None;
            inner.config.locked_by = None;
            inner.recent_blocks.clear();
            self.persist(&inner.config);
            was_active
        };
        if was_active {
            info!("lockdown deactivated");
            self.notify(false, None);
        }
        self.cancel_timer();
    }

    /// Gate every operation through this while integrating with a host.
    pub fn check(&self) -> CheckResult {
        let inner = self.inner.lock().expect("breaker lock");
        if !inner.config.active {
            return CheckResult {
                allowed: true,
                reason: None,
                suggestion: None,
            };
        }

        let since = inner
            .config
            .locked_at
            .as_deref()
            .unwrap_or("(restored from previous session)");
        let by = inner
            .config
            .locked_by
            .as_deref()
            .unwrap_or("(restored from previous session)");

        CheckResult {
            allowed: false,
            reason: Some(format!(
                "LOCKDOWN ACTIVE (since {}, triggered by: {})",
                since, by
            )),
            suggestion: Some(
                "System will auto-recover shortly. Or run: palisade lockdown off".to_owned(),
            ),
        }
    }

    /// Whether the switch is currently engaged.
    pub fn is_active(&self) -> bool {
        self.inner.lock().expect("breaker lock").config.active
    }

    /// Snapshot for status reporting.
    pub fn status(&self) -> LockdownStatus {
        let inner = self.inner.lock().expect("breaker lock");
        LockdownStatus {
            active: inner.config.active,
            auto_trigger: inner.config.auto_trigger,
            auto_trigger_threshold: inner.config.auto_trigger_threshold,
            triggered_count: inner.triggered_count,
            locked_at: inner.config.locked_at.clone(),
            locked_by: inner.config.locked_by.clone(),
        }
    }

    /// Persist config; failures are logged and swallowed — a lost write
    /// must never fail the kill switch itself.
    fn persist(&self, config: &LockdownConfig) {
        if let Err(e) = self.store.save(config) {
            warn!("failed to persist lockdown state: {}", e);
        }
    }

    fn notify(&self, active: bool, triggered_by: Option<&str>) {
        let observer = self.observer.lock().expect("observer lock").clone();
        if let Some(observer) = observer {
            observer.lockdown_changed(active, triggered_by);
        }
    }

    /// Replace the recovery timer with a fresh single-shot. Replacing first
    /// aborts any pending timer, so duplicate deactivation callbacks are
    /// impossible.
    fn arm_timer(self: &Arc<Self>, delay: Duration) {
        let breaker = Arc::clone(self);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            breaker.deactivate();
        });
        let mut timer = self.timer.lock().expect("timer lock");
        if let Some(old) = timer.replace(handle) {
            old.abort();
        }
    }

    fn cancel_timer(&self) {
        if let Some(handle) = self.timer.lock().expect("timer lock").take() {
            handle.abort();
        }
    }
}

impl Drop for CircuitBreaker {
    fn drop(&mut self) {
        if let Ok(mut timer) = self.timer.lock() {
            if let Some(handle) = timer.take() {
                handle.abort();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn breaker_in(dir: &TempDir) -> Arc<CircuitBreaker> {
        let store = StateStore::new(dir.path().join("lockdown.json"));
        CircuitBreaker::new(LockdownConfig::default(), store)
    }

    #[tokio::test(start_paused = true)]
    async fn test_nine_blocks_stay_standby_tenth_trips() {
        let dir = TempDir::new().unwrap();
        let breaker = breaker_in(&dir);

        for _ in 0..9 {
            breaker.report_block_event("test block");
        }
        assert!(!breaker.is_active());
        assert!(breaker.check().allowed);

        breaker.report_block_event("test block");
        assert!(breaker.is_active());

        let check = breaker.check();
        assert!(!check.allowed);
        let reason = check.reason.unwrap();
        assert!(reason.contains("LOCKDOWN ACTIVE"));
        assert!(reason.contains("Velocity Circuit Breaker (10 blocks in 60s)"));
        assert!(check.suggestion.unwrap().contains("lockdown off"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_blocks_evicted_from_window() {
        let dir = TempDir::new().unwrap();
        let breaker = breaker_in(&dir);

        // 20 blocks, 61 seconds apart: window never holds more than one
        for _ in 0..20 {
            breaker.report_block_event("slow probe");
            tokio::time::advance(Duration::from_secs(61)).await;
        }
        assert!(!breaker.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_trigger_when_disabled() {
        let dir = TempDir::new().unwrap();
        let store = StateStore::new(dir.path().join("lockdown.json"));
        let config = LockdownConfig {
            auto_trigger: false,
            ..LockdownConfig::default()
        };
        let breaker = CircuitBreaker::new(config, store);

        for _ in 0..50 {
            breaker.report_block_event("blocked");
        }
        assert!(!breaker.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reports_ignored_while_active() {
        let dir = TempDir::new().unwrap();
        let breaker = breaker_in(&dir);
        breaker.activate("operator", false);

        let before = breaker.status().triggered_count;
        for _ in 0..20 {
            breaker.report_block_event("blocked");
        }
        assert_eq!(breaker.status().triggered_count, before);
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_recovery_after_cooldown() {
        let dir = TempDir::new().unwrap();
        let breaker = breaker_in(&dir);

        breaker.activate("velocity", true);
        assert!(breaker.is_active());

        tokio::time::advance(RECOVERY_COOLDOWN + Duration::from_secs(1)).await;
        assert!(!breaker.is_active());
        assert!(breaker.check().allowed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_activation_without_recovery_stays() {
        let dir = TempDir::new().unwrap();
        let breaker = breaker_in(&dir);

        breaker.activate("operator", false);
        tokio::time::advance(RECOVERY_COOLDOWN * 3).await;
        assert!(breaker.is_active());

        breaker.deactivate();
        assert!(!breaker.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reactivation_replaces_timer() {
        let dir = TempDir::new().unwrap();
        let breaker = breaker_in(&dir);

        breaker.activate("first", true);
        tokio::time::advance(Duration::from_secs(4 * 60)).await;
        // Re-activate: a fresh full cooldown replaces the old timer
        breaker.activate("second", true);
        tokio::time::advance(Duration::from_secs(2 * 60)).await;
        assert!(breaker.is_active(), "old timer must not fire early");

        tokio::time::advance(Duration::from_secs(3 * 60 + 1)).await;
        assert!(!breaker.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_transitions_persisted() {
        let dir = TempDir::new().unwrap();
        let store = StateStore::new(dir.path().join("lockdown.json"));
        let breaker = CircuitBreaker::new(LockdownConfig::default(), store.clone());

        breaker.activate("operator", false);
        let on_disk = store.load().unwrap();
        assert!(on_disk.active);
        assert_eq!(on_disk.locked_by.as_deref(), Some("operator"));
        assert!(on_disk.locked_at.is_some());

        breaker.deactivate();
        let on_disk = store.load().unwrap();
        assert!(!on_disk.active);
        assert!(on_disk.locked_at.is_none());
        assert!(on_disk.locked_by.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_recovery_stale_lock_cleared() {
        let dir = TempDir::new().unwrap();
        let store = StateStore::new(dir.path().join("lockdown.json"));

        // Locked 6 minutes ago with a 5-minute cooldown: stale
        let locked_at = (Utc::now() - chrono::Duration::minutes(6)).to_rfc3339();
        let config = LockdownConfig {
            active: true,
            locked_at: Some(locked_at),
            locked_by: Some("previous session".to_owned()),
            ..LockdownConfig::default()
        };
        store.save(&config).unwrap();

        let breaker = CircuitBreaker::new(store.load().unwrap(), store.clone());
        assert!(!breaker.is_active());
        assert!(!store.load().unwrap().active);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_recovery_rearms_remaining_cooldown() {
        let dir = TempDir::new().unwrap();
        let store = StateStore::new(dir.path().join("lockdown.json"));

        // Locked 4 minutes ago: ~1 minute of cooldown remains
        let locked_at = (Utc::now() - chrono::Duration::minutes(4)).to_rfc3339();
        let config = LockdownConfig {
            active: true,
            locked_at: Some(locked_at),
            locked_by: Some("previous session".to_owned()),
            ..LockdownConfig::default()
        };
        store.save(&config).unwrap();

        let breaker = CircuitBreaker::new(store.load().unwrap(), store.clone());
        assert!(breaker.is_active());
        assert!(!breaker.check().allowed);

        tokio::time::advance(Duration::from_secs(70)).await;
        assert!(!breaker.is_active(), "remaining cooldown should have fired");
    }

    #[tokio::test(start_paused = true)]
    async fn test_unparseable_timestamp_treated_as_stale() {
        let dir = TempDir::new().unwrap();
        let store = StateStore::new(dir.path().join("lockdown.json"));
        let config = LockdownConfig {
            active: true,
            locked_at: Some("not a timestamp".to_owned()),
            locked_by: Some("corrupt".to_owned()),
            ..LockdownConfig::default()
        };
        store.save(&config).unwrap();

        let breaker = CircuitBreaker::new(store.load().unwrap(), store);
        assert!(!breaker.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_cleared_after_trip() {
        let dir = TempDir::new().unwrap();
        let breaker = breaker_in(&dir);

        for _ in 0..10 {
            breaker.report_block_event("burst");
        }
        assert!(breaker.is_active());
        breaker.deactivate();

        // Window was cleared on trip; 9 more blocks must not re-trip
        for _ in 0..9 {
            breaker.report_block_event("burst");
        }
        assert!(!breaker.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_observer_sees_transitions() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        struct Counter(AtomicUsize, AtomicUsize);
        impl LockdownObserver for Counter {
            fn lockdown_changed(&self, active: bool, _by: Option<&str>) {
                if active {
                    self.0.fetch_add(1, Ordering::SeqCst);
                } else {
                    self.1.fetch_add(1, Ordering::SeqCst);
                }
            }
        }

        let dir = TempDir::new().unwrap();
        let breaker = breaker_in(&dir);
        let counter = Arc::new(Counter(AtomicUsize::new(0), AtomicUsize::new(0)));
        breaker.set_observer(counter.clone());

        breaker.activate("operator", false);
        breaker.deactivate();
        breaker.deactivate(); // idempotent: no second notification

        assert_eq!(counter.0.load(Ordering::SeqCst), 1);
        assert_eq!(counter.1.load(Ordering::SeqCst), 1);
    }
}
