//! # Pattern-Matching Phase — Threat Detection
//!
//! Scans cleaned input for known threats. Read-only: never modifies input.
//! Three independently-toggleable sub-checks run in a fixed order and
//! short-circuit on the first block:
//!
//! 1. Injection scan — ordered regex rules over whitespace-collapsed text
//! 2. Template expression blocking — literal text against engine delimiters
//! 3. Dangerous URI scheme blocking

use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::PatternOptions;
use crate::patterns::{DANGEROUS_SCHEMES, INJECTION_RULES, TEMPLATE_RULES};

static WHITESPACE_RUNS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("whitespace regex"));

/// Outcome of the pattern-matching phase.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectResult {
    pub blocked: bool,
    /// Present iff `blocked`.
    pub reason: Option<String>,
    /// Id of the matching rule (`INJ-*`, `TMPL`, or `SCHEME`).
    pub pattern_id: Option<&'static str>,
}

impl DetectResult {
    fn pass() -> Self {
        Self {
            blocked: false,
            reason: None,
            pattern_id: None,
        }
    }

    fn block(reason: String, pattern_id: &'static str) -> Self {
        Self {
            blocked: true,
            reason: Some(reason),
            pattern_id: Some(pattern_id),
        }
    }
}

/// Run the pattern scan over cleaned text. First match wins.
pub fn detect(input: &str, opts: &PatternOptions) -> DetectResult {
    // 1. Injection scan. Collapsing whitespace runs defeats padding attacks
    //    like "ignore    all \n previous   instructions".
    if opts.injection {
        let collapsed = WHITESPACE_RUNS.replace_all(input, " ");
        for rule in INJECTION_RULES.iter() {
            if rule.pattern.is_match(&collapsed) {
                return DetectResult::block(
                    format!("Prompt injection detected: {} [{}]", rule.category, rule.id),
                    rule.id,
                );
            }
        }
    }

    // 2. Template expression blocking — tested against literal text, since
    //    delimiters like `{{ }}` are whitespace-sensitive.
    if opts.templates {
        for tmpl in TEMPLATE_RULES.iter() {
            if tmpl.pattern.is_match(input) {
                return DetectResult::block(
                    format!("Template expression detected ({})", tmpl.engine),
                    "TMPL",
                );
            }
        }
    }

    // 3. Dangerous URI scheme blocking
    if opts.schemes {
        if let Some(caps) = DANGEROUS_SCHEMES.captures(input) {
            let scheme = caps[1].to_lowercase();
            return DetectResult::block(format!("Dangerous URL scheme: {}://", scheme), "SCHEME");
        }
    }

    DetectResult::pass()
}
