//! Audit sink for security events.
//!
//! Every block, every clean allow, and every lockdown transition produces
//! an audit event. The sink is a trait so hosts can route events into
//! their own append-only stores; the default implementation forwards to
//! `tracing`.

use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, info, warn};

use palisade_lockdown::LockdownObserver;

/// Which subsystem produced an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Feature {
    Guard,
    Lockdown,
}

impl Feature {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Guard => "guard",
            Self::Lockdown => "lockdown",
        }
    }
}

/// Event severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warn,
    Error,
    Critical,
}

/// Destination for security events.
pub trait AuditSink: Send + Sync {
    fn log_security_event(
        &self,
        feature: Feature,
        severity: Severity,
        category: &str,
        message: &str,
        metadata: Value,
    );
}

/// Default sink: structured `tracing` events.
#[derive(Debug, Default)]
pub struct TracingAudit;

impl AuditSink for TracingAudit {
    fn log_security_event(
        &self,
        feature: Feature,
        severity: Severity,
        category: &str,
        message: &str,
        metadata: Value,
    ) {
        let feature = feature.as_str();
        match severity {
            Severity::Info => {
                info!(feature, category, %metadata, "{}", message);
            }
            Severity::Warn => {
                warn!(feature, category, %metadata, "{}", message);
            }
            Severity::Error | Severity::Critical => {
                error!(feature, category, %metadata, "{}", message);
            }
        }
    }
}

/// Adapter that reports lockdown transitions to an audit sink.
struct LockdownAudit {
    audit: Arc<dyn AuditSink>,
}

impl LockdownObserver for LockdownAudit {
    fn lockdown_changed(&self, active: bool, triggered_by: Option<&str>) {
        if active {
            self.audit.log_security_event(
                Feature::Lockdown,
                Severity::Critical,
                "activate",
                "Lockdown activated",
                json!({ "triggeredBy": triggered_by }),
            );
        } else {
            self.audit.log_security_event(
                Feature::Lockdown,
                Severity::Info,
                "deactivate",
                "Lockdown deactivated",
                json!({}),
            );
        }
    }
}

/// Build a lockdown observer that forwards transitions to `audit`.
pub fn lockdown_audit_observer(audit: Arc<dyn AuditSink>) -> Arc<dyn LockdownObserver> {
    Arc::new(LockdownAudit { audit })
}
