//! # Entropy Layer
//!
//! Shannon entropy over character frequency, in bits per character.
//! Reference points: English prose runs ~4.0-4.5, base64 data ~6.0,
//! encrypted or compressed payloads higher still. Three checks, in order:
//!
//! 1. Long text (>50 chars) with entropy above 6.0 — likely encrypted or
//!    compressed payload.
//! 2. Text matching the base64 or hex charset exactly, above the
//!    charset-specific entropy ceiling (5.0 / 3.8), with no spaces and at
//!    least 16 chars — encoded payload used for indirection.
//! 3. Trimmed text ending in `=` or `==` over the base64 charset — padding
//!    signature, flagged regardless of entropy.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::json;

use super::LayerResult;

static BASE64_CHARSET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9+/=\s]+$").expect("base64 charset regex"));
static HEX_CHARSET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9a-fA-F\s]+$").expect("hex charset regex"));
static BASE64_PADDED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9+/]+={1,2}$").expect("base64 padded regex"));

/// Shannon entropy in bits per character.
pub fn calculate_entropy(text: &str) -> f64 {
    if text.is_empty() {
        return 0.0;
    }

    let mut freq = std::collections::HashMap::new();
    let mut len = 0usize;
    for c in text.chars() {
        *freq.entry(c).or_insert(0usize) += 1;
        len += 1;
    }

    let len = len as f64;
    let mut entropy = 0.0;
    for &count in freq.values() {
        let p = count as f64 / len;
        entropy -= p * p.log2();
    }
    entropy
}

/// Run the entropy layer.
pub fn detect_entropy(text: &str) -> LayerResult {
    let entropy = calculate_entropy(text);
    let len = text.chars().count();

    // 1. Long high-entropy text: encrypted/random payload
    if entropy > 6.0 && len > 50 {
        return LayerResult::block(
            entropy,
            format!(
                "High entropy detected: {:.2} (likely encoded payload)",
                entropy
            ),
        )
        .with_metadata(json!({ "entropy": entropy }));
    }

    // 2. Base64/hex charset with anomalous entropy for that alphabet
    if len > 10 {
        let suspicious_base64 = BASE64_CHARSET.is_match(text) && entropy > 5.0;
        let suspicious_hex = HEX_CHARSET.is_match(text) && entropy > 3.8;

        // Encoded blobs have no spaces (unless chunked); short words in the
        // charset are exempt
        if (suspicious_base64 || suspicious_hex) && !text.contains(' ') && len > 16 {
            return LayerResult::block(
                entropy,
                format!(
                    "Suspicious character distribution (Entropy: {:.2}) - Possible encoded payload",
                    entropy
                ),
            )
            .with_metadata(json!({ "entropy": entropy }));
        }

        // 3. Base64 padding signature, independent of entropy
        let trimmed = text.trim();
        if (trimmed.ends_with("==") || trimmed.ends_with('=')) && BASE64_PADDED.is_match(trimmed) {
            return LayerResult::block(entropy, "Base64 signature detected (ending in =)")
                .with_metadata(json!({ "entropy": entropy }));
        }
    }

    LayerResult::pass(entropy)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entropy_empty() {
        assert_eq!(calculate_entropy(""), 0.0);
    }

    #[test]
    fn test_entropy_single_char_repeated() {
        assert_eq!(calculate_entropy("aaaaaaa"), 0.0);
    }

    #[test]
    fn test_entropy_two_chars_equal() {
        let entropy = calculate_entropy("abababab");
        assert!((entropy - 1.0).abs() < 0.01, "expected ~1.0, got {}", entropy);
    }

    #[test]
    fn test_normal_prose_passes() {
        let res = detect_entropy("The quick brown fox jumps over the lazy dog and naps.");
        assert!(!res.blocked, "prose entropy: {}", res.score);
        assert!(res.score < 5.0);
    }

    #[test]
    fn test_base64_blob_blocked() {
        // No spaces, base64 charset, maximal entropy for that alphabet (6.0)
        let res = detect_entropy(
            "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/",
        );
        assert!(res.blocked, "entropy: {}", res.score);
    }

    #[test]
    fn test_hex_blob_blocked() {
        let res = detect_entropy("deadbeef0123456789abcdef0123456789abcdef");
        assert!(res.blocked, "entropy: {}", res.score);
        assert!(res.reason.unwrap().contains("encoded payload"));
    }

    #[test]
    fn test_base64_padding_signature_blocked() {
        let res = detect_entropy("YXR0YWNrCg==");
        assert!(res.blocked);
        assert!(res.reason.unwrap().contains("Base64 signature"));
    }

    #[test]
    fn test_short_word_not_flagged() {
        // "deadbeef" is valid hex charset but too short to matter
        let res = detect_entropy("deadbeef");
        assert!(!res.blocked);
    }

    #[test]
    fn test_spaced_text_in_charset_not_flagged() {
        // Spaces exempt charset matches (chunking aside, prose wins)
        let res = detect_entropy("added bed faced cafe beef dead");
        assert!(!res.blocked);
    }

    #[test]
    fn test_score_is_raw_entropy_on_pass() {
        let res = detect_entropy("hello world");
        assert!(!res.blocked);
        assert!((res.score - calculate_entropy("hello world")).abs() < f64::EPSILON);
    }
}
