//! # Behavioral Heuristics Layer
//!
//! Accumulates weighted signals over the full text/token set and blocks
//! when the sum reaches the configured threshold (default 100). No single
//! signal blocks on its own; the layer catches attacks whose individual
//! tells are each too weak to act on.
//!
//! The keyword sets are attack-specific on purpose. Common request verbs
//! (write, create, show, tell, answer, translate) appear in nearly every
//! benign message and are excluded from the imperative set.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::json;
use std::collections::HashSet;

use super::LayerResult;

/// One contributing heuristic signal.
#[derive(Debug, Clone, serde::Serialize)]
pub struct HeuristicSignal {
    pub name: &'static str,
    pub score: u32,
    pub reason: String,
}

/// Attack-specific imperative verbs.
const IMPERATIVES: &[&str] = &[
    "ignore", "discard", "forget", "bypass", "override", "disable",
    "manipulate", "hack", "crack", "jailbreak", "exploit",
    "reveal", "dump", "leak", "expose", "unmask", "disclose",
    "pretend", "roleplay", "simulate", "imitate", "feign",
    "force", "compel", "coerce", "demand", "command", "dictate", "mandate",
    "decode", "decipher", "decrypt", "unencrypt",
];

/// Meta-instruction vocabulary (rules, personas, privileges, secrecy).
const META_WORDS: &[&str] = &[
    "rule", "rules", "guideline", "guidelines", "policy", "policies", "constraint",
    "constraints", "restriction", "restrictions", "safety", "security", "filter",
    "filters", "moderation", "censorship", "ethics", "ethical", "moral", "morality",
    "system", "program", "programming", "code", "algorithm", "model", "engine",
    "kernel", "core", "backend", "prompt", "instruction", "instructions", "directive",
    "directives", "command", "commands", "order", "orders", "mode", "role", "persona",
    "character", "identity", "profile", "configuration", "config", "settings", "setup",
    "developer", "admin", "administrator", "root", "superuser", "owner", "creator",
    "maker", "author", "god", "human", "user", "operator", "controller", "supervisor",
    "manager", "director", "leader", "boss", "chief", "unfiltered", "uncensored",
    "unrestricted", "unlimited", "unbound", "free", "liberated", "released", "open",
    "secret", "hidden", "private", "confidential", "classified", "internal",
    "proprietary", "sensitive", "restricted",
];

/// Code/exploit keywords. Entries with non-word characters are matched as
/// substrings; plain words against the token set.
const CODE_KEYWORDS: &[&str] = &[
    "exec", "eval", "system", "popen", "subprocess", "spawn", "fork", "kill",
    "chmod", "chown", "wget", "curl", "netcat", "nc", "ncat", "ssh", "scp", "ftp",
    "telnet", "tftp", "base64", "hex", "rot13", "xor", "aes", "rsa", "des", "md5",
    "sha1", "sha256", "sql", "injection", "xss", "csrf", "rce", "lfi", "rfi",
    "ssrf", "xxe", "idor", "buffer", "overflow", "stack", "heap", "format",
    "string", "shell", "payload", "exploit", "/etc/passwd", "/etc/shadow",
    "/bin/sh", "/bin/bash", "cmd.exe", "powershell", "pwsh", "javascript:",
    "vbscript:", "data:", "file:", "phar:", "zip:", "expect:", "gopher:",
];

static TOKEN_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\w+\b").expect("token regex"));
static PUNCTUATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"[!?.,;:]").expect("punct regex"));
static CODE_MARKERS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"[{}\[\]();=]|function\b|return\b|if\s*\(|for\s*\(|while\s*\(|class\s+|const\s+|let\s+|var\s+",
    )
    .expect("code marker regex")
});

fn is_plain_word(kw: &str) -> bool {
    kw.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

fn count_keywords(set: &[&str], lower_text: &str, token_set: &HashSet<&str>) -> usize {
    set.iter()
        .filter(|kw| {
            if is_plain_word(kw) {
                token_set.contains(*kw)
            } else {
                lower_text.contains(*kw)
            }
        })
        .count()
}

fn run_heuristics(text: &str) -> Vec<HeuristicSignal> {
    let mut signals = Vec::new();

    let lower = text.to_lowercase();
    let tokens: Vec<&str> = TOKEN_RUNS.find_iter(&lower).map(|m| m.as_str()).collect();
    let token_set: HashSet<&str> = tokens.iter().copied().collect();
    let len = text.chars().count();

    // 1. Length anomaly
    if len > 5000 {
        signals.push(HeuristicSignal {
            name: "LENGTH",
            score: 30,
            reason: "Unusually long message".to_owned(),
        });
    }

    // 2. Excessive punctuation
    let punct_count = PUNCTUATION.find_iter(text).count();
    if len > 20 && punct_count as f64 / len as f64 > 0.15 {
        signals.push(HeuristicSignal {
            name: "PUNCTUATION",
            score: 20,
            reason: "Excessive punctuation".to_owned(),
        });
    }

    // 3. Repeated words ("ignore ignore ignore")
    if tokens.len() > 10 {
        let repetition = 1.0 - token_set.len() as f64 / tokens.len() as f64;
        if repetition > 0.5 {
            signals.push(HeuristicSignal {
                name: "REPETITION",
                score: 40,
                reason: "High word repetition".to_owned(),
            });
        }
    }

    // 4. Imperative tone
    let imperative_count = count_keywords(IMPERATIVES, &lower, &token_set);
    if imperative_count >= 3 {
        signals.push(HeuristicSignal {
            name: "IMPERATIVE",
            score: 40,
            reason: format!("{} command words detected", imperative_count),
        });
    }

    // 5. Meta-instruction keywords
    let meta_count = count_keywords(META_WORDS, &lower, &token_set);
    if meta_count >= 3 {
        signals.push(HeuristicSignal {
            name: "META",
            score: 50,
            reason: format!("{} meta-instruction keywords detected", meta_count),
        });
    }

    // 6. Code/exploit keywords
    let code_count = count_keywords(CODE_KEYWORDS, &lower, &token_set);
    if code_count >= 2 {
        signals.push(HeuristicSignal {
            name: "CODE_KEYWORDS",
            score: 40,
            reason: format!("{} code/exploit keywords detected", code_count),
        });
    }

    // 7. Unusual capitalization ("IGNORE ALL INSTRUCTIONS")
    let caps_count = text.chars().filter(|c| c.is_ascii_uppercase()).count();
    if len > 20 && caps_count as f64 / len as f64 > 0.6 {
        signals.push(HeuristicSignal {
            name: "CAPS",
            score: 25,
            reason: "Excessive capitalization".to_owned(),
        });
    }

    // 8. Code-like syntax — only dense clusters; a user discussing code
    //    naturally uses 'function', parentheses, etc.
    let marker_count = CODE_MARKERS.find_iter(text).count();
    if marker_count >= 3 {
        signals.push(HeuristicSignal {
            name: "CODE_SYNTAX",
            score: 15,
            reason: format!("Code-like syntax detected ({} markers)", marker_count),
        });
    }

    signals
}

/// Run the heuristics layer. Blocks iff the summed score reaches `threshold`.
pub fn detect_heuristics(text: &str, threshold: u32) -> LayerResult {
    let signals = run_heuristics(text);
    let total: u32 = signals.iter().map(|s| s.score).sum();

    if total >= threshold {
        let names: Vec<&str> = signals.iter().map(|s| s.name).collect();
        return LayerResult::block(
            total as f64,
            format!(
                "Suspicious behavior detected (Score: {}): {}",
                total,
                names.join(", ")
            ),
        )
        .with_metadata(json!({ "heuristics": signals }));
    }

    LayerResult::pass(total as f64).with_metadata(json!({ "heuristics": signals }))
}
