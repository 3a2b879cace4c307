//! Pipeline result and host-facing decision types.

use serde::Serialize;
use std::collections::BTreeMap;

use palisade_guard::EgressResult;

/// Result of a full guard pipeline run.
///
/// Invariants:
/// - `phases_run` reflects execution order and truncates at the first block.
/// - `reason` is present iff `blocked`.
/// - `layer_scores` only holds layers that produce a meaningful score.
#[derive(Debug, Clone, Serialize)]
pub struct GuardResult {
    /// The cleaned (and therefore safe-to-forward) text.
    pub sanitized: String,
    pub blocked: bool,
    pub reason: Option<String>,
    /// Non-blocking observations, in accumulation order.
    pub warnings: Vec<String>,
    /// Layer names in execution order, ending at the blocking layer.
    pub phases_run: Vec<&'static str>,
    /// Numeric score per scoring layer.
    pub layer_scores: BTreeMap<&'static str, f64>,
}

impl GuardResult {
    /// Passthrough result for a disabled pipeline.
    pub fn passthrough(content: &str) -> Self {
        Self {
            sanitized: content.to_owned(),
            blocked: false,
            reason: None,
            warnings: Vec::new(),
            phases_run: Vec::new(),
            layer_scores: BTreeMap::new(),
        }
    }
}

/// Point-in-time feature summary for dashboards/status commands.
#[derive(Debug, Clone, Serialize)]
pub struct FeatureStatus {
    pub name: &'static str,
    pub label: &'static str,
    pub enabled: bool,
    pub blocked: u64,
    pub allowed: u64,
}

/// The `{ cancel, content? }` decision shape host hooks expect back.
///
/// `content` carries replacement text: the sanitized input on an allowed
/// inbound message, or the redacted text on a modified outbound one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GateDecision {
    pub cancel: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl From<&GuardResult> for GateDecision {
    fn from(result: &GuardResult) -> Self {
        Self {
            cancel: result.blocked,
            content: (!result.blocked).then(|| result.sanitized.clone()),
        }
    }
}

impl From<&EgressResult> for GateDecision {
    fn from(result: &EgressResult) -> Self {
        Self {
            cancel: false,
            content: result.redacted.then(|| result.text.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_passthrough_shape() {
        let res = GuardResult::passthrough("hello");
        assert_eq!(res.sanitized, "hello");
        assert!(!res.blocked);
        assert!(res.phases_run.is_empty());
    }

    #[test]
    fn test_gate_decision_blocks_cancel() {
        let mut res = GuardResult::passthrough("x");
        res.blocked = true;
        res.reason = Some("nope".into());
        let decision = GateDecision::from(&res);
        assert!(decision.cancel);
        assert!(decision.content.is_none());
    }

    #[test]
    fn test_gate_decision_allow_carries_sanitized() {
        let res = GuardResult::passthrough("cleaned text");
        let decision = GateDecision::from(&res);
        assert!(!decision.cancel);
        assert_eq!(decision.content.as_deref(), Some("cleaned text"));
    }

    #[test]
    fn test_gate_decision_egress_never_cancels() {
        let egress = EgressResult {
            text: "[REDACTED Email]".into(),
            blocked: false,
            reason: Some("Output contained sensitive data".into()),
            redacted: true,
        };
        let decision = GateDecision::from(&egress);
        assert!(!decision.cancel);
        assert_eq!(decision.content.as_deref(), Some("[REDACTED Email]"));
    }
}
