//! # Cleaning Phase — Normalize & Sanitize
//!
//! Rewrites input into a safe canonical form. Always runs first: every
//! downstream layer operates on the cleaned text, so evasion characters
//! (zero-width joiners, bidi overrides, confusable look-alikes) must be gone
//! before any pattern is tested.
//!
//! The pipeline order is fixed:
//!
//! 1. Unicode NFKC normalization
//! 2. Invisible character stripping (zero-width, bidi, variation selectors, tags)
//! 3. Control character stripping (ANSI escapes, null bytes, etc.)
//! 4. Newline normalization (`\r\n` → `\n`, `\r` → `\n`)
//! 5. Confusable folding (Cyrillic → Latin, etc.)
//! 6. Length limit on the final text
//!
//! The length gate runs last so an attacker cannot smuggle an oversized
//! payload past it with strippable padding.

use unicode_normalization::UnicodeNormalization;

use crate::config::CleanOptions;
use crate::patterns::{
    is_bidi_control, is_invisible, is_stripped_control, is_tag_char, is_variation_selector,
    ANSI_ESCAPE, CONFUSABLE_MAP,
};

/// Outcome of the cleaning phase.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanResult {
    /// The canonical text. Populated even when blocked.
    pub text: String,
    /// True if the (cleaned) input exceeded the length limit.
    pub blocked: bool,
    /// Present iff `blocked`.
    pub reason: Option<String>,
    /// True if any step changed the text.
    pub modified: bool,
}

/// Run the cleaning pipeline. No other layer runs if this blocks.
pub fn clean(input: &str, opts: &CleanOptions) -> CleanResult {
    let mut text = input.to_owned();
    let mut modified = false;

    // 1. Unicode NFKC normalization
    if opts.unicode_normalize {
        let normalized: String = text.nfkc().collect();
        if normalized != text {
            text = normalized;
            modified = true;
        }
    }

    // 2. Invisible character stripping
    if opts.invisible_strip {
        let stripped: String = text
            .chars()
            .filter(|&c| {
                !(is_invisible(c)
                    || is_bidi_control(c)
                    || is_variation_selector(c)
                    || is_tag_char(c))
            })
            .collect();
        if stripped != text {
            text = stripped;
            modified = true;
        }
    }

    // 3. Control character stripping: ANSI sequences first, then bare C0
    if opts.control_strip {
        let no_ansi = ANSI_ESCAPE.replace_all(&text, "");
        let stripped: String = no_ansi.chars().filter(|&c| !is_stripped_control(c)).collect();
        if stripped != text {
            text = stripped;
            modified = true;
        }
    }

    // 4. Newline normalization
    if opts.newline_normalize {
        let normalized = text.replace("\r\n", "\n").replace('\r', "\n");
        if normalized != text {
            text = normalized;
            modified = true;
        }
    }

    // 5. Confusable folding (Cyrillic → Latin, etc.)
    if opts.homoglyph_normalize {
        let mut folded = String::with_capacity(text.len());
        let mut has_confusables = false;
        for c in text.chars() {
            match CONFUSABLE_MAP.get(&c) {
                Some(&latin) => {
                    folded.push(latin);
                    has_confusables = true;
                }
                None => folded.push(c),
            }
        }
        if has_confusables {
            text = folded;
            modified = true;
        }
    }

    // 6. Length limit on the final text
    let len = text.chars().count();
    if len > opts.max_input_length {
        let reason = format!(
            "Input too large ({} chars, max {})",
            len, opts.max_input_length
        );
        return CleanResult {
            text,
            blocked: true,
            reason: Some(reason),
            modified,
        };
    }

    CleanResult {
        text,
        blocked: false,
        reason: None,
        modified,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts() -> CleanOptions {
        CleanOptions::default()
    }

    #[test]
    fn test_clean_passthrough() {
        let res = clean("hello world", &opts());
        assert_eq!(res.text, "hello world");
        assert!(!res.blocked);
        assert!(!res.modified);
    }

    #[test]
    fn test_zero_width_stripped() {
        let res = clean("Hel\u{200B}lo", &opts());
        assert_eq!(res.text, "Hello");
        assert!(res.modified);
    }

    #[test]
    fn test_bidi_override_stripped() {
        let res = clean("abc\u{202E}def", &opts());
        assert_eq!(res.text, "abcdef");
        assert!(res.modified);
    }

    #[test]
    fn test_cyrillic_folded_to_latin() {
        // Cyrillic А В С
        let res = clean("\u{0410}\u{0412}\u{0421}", &opts());
        assert_eq!(res.text, "ABC");
        assert!(res.modified);
    }

    #[test]
    fn test_fullwidth_normalized_by_nfkc() {
        let res = clean("\u{FF28}\u{FF49}", &opts()); // Ｈｉ
        assert_eq!(res.text, "Hi");
        assert!(res.modified);
    }

    #[test]
    fn test_ansi_and_control_stripped() {
        let res = clean("\x1b[31mred\x1b[0m\x00 text", &opts());
        assert_eq!(res.text, "red text");
        assert!(res.modified);
    }

    #[test]
    fn test_tab_and_newline_preserved() {
        let res = clean("a\tb\nc", &opts());
        assert_eq!(res.text, "a\tb\nc");
        assert!(!res.modified);
    }

    #[test]
    fn test_crlf_normalized() {
        let mut o = opts();
        o.control_strip = false; // let \r reach the newline step
        let res = clean("a\r\nb\rc", &o);
        assert_eq!(res.text, "a\nb\nc");
        assert!(res.modified);
    }

    #[test]
    fn test_length_limit_blocks() {
        let mut o = opts();
        o.max_input_length = 10;
        let res = clean(&"x".repeat(11), &o);
        assert!(res.blocked);
        let reason = res.reason.unwrap();
        assert!(reason.contains("11 chars"));
        assert!(reason.contains("max 10"));
    }

    #[test]
    fn test_length_checked_after_stripping() {
        let mut o = opts();
        o.max_input_length = 5;
        // 10 zero-width chars + 5 letters: final text is exactly 5 chars
        let input = format!("{}hello", "\u{200B}".repeat(10));
        let res = clean(&input, &o);
        assert!(!res.blocked);
        assert_eq!(res.text, "hello");
    }

    #[test]
    fn test_toggles_disable_steps() {
        let o = CleanOptions {
            unicode_normalize: false,
            invisible_strip: false,
            control_strip: false,
            newline_normalize: false,
            homoglyph_normalize: false,
            max_input_length: 100_000,
        };
        let res = clean("Hel\u{200B}lo\r\n", &o);
        assert_eq!(res.text, "Hel\u{200B}lo\r\n");
        assert!(!res.modified);
    }
}
