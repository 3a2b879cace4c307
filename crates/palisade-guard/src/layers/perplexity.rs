//! # Perplexity Layer
//!
//! Flags statistically anomalous token sequences without a real language
//! model. A fixed ~200-word unigram frequency table (roughly Zipfian,
//! simplified) blended with a small curated bigram table stands in for the
//! model; perplexity is `exp(-mean log-probability)` over the tokens.
//!
//! ## Calibration
//!
//! Unknown words take a floor probability of 0.0001, so all-unknown
//! gibberish tops out near `exp(9.21) ≈ 10000`. Ordinary prose — a mix of
//! common and unknown words — lands in the low hundreds. The default block
//! threshold of 2000 keeps benign messages well clear while catching
//! gibberish and adversarial-suffix-style sequences. A production-sized
//! vocabulary (50k words, 1e-6 floor) would yield lower absolute values;
//! the threshold is calibrated to THIS table.
//!
//! Inputs under 50 chars are skipped entirely: short fragments ("hi",
//! "thanks") carry too little signal and must never trip this layer.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::json;
use std::collections::HashMap;

use super::LayerResult;

/// Minimum input length for perplexity to be meaningful (roughly 8-10 words).
pub const MIN_INPUT_LENGTH: usize = 50;

/// Floor probability for words not in the table.
const FLOOR_PROBABILITY: f64 = 0.0001;

/// Top common English words with simplified Zipfian frequencies, plus
/// technical/log vocabulary and conversational words that would otherwise
/// false-positive. "ignore"/"instructions" are pinned to the floor so
/// override phrasing spikes the score.
static COMMON_UNIGRAMS: Lazy<HashMap<&'static str, f64>> = Lazy::new(|| {
    let mut m = HashMap::new();
    let entries: &[(&str, f64)] = &[
        ("the", 0.07), ("of", 0.035), ("and", 0.030), ("to", 0.025), ("a", 0.025),
        ("in", 0.020), ("that", 0.012), ("is", 0.010), ("was", 0.010), ("he", 0.009),
        ("for", 0.009), ("it", 0.008), ("with", 0.007), ("as", 0.007), ("his", 0.006),
        ("on", 0.006), ("be", 0.006), ("at", 0.005), ("by", 0.005), ("i", 0.005),
        ("this", 0.005), ("had", 0.005), ("not", 0.004), ("are", 0.004), ("but", 0.004),
        ("from", 0.004), ("or", 0.004), ("have", 0.004), ("an", 0.003), ("they", 0.003),
        ("which", 0.003), ("one", 0.003), ("you", 0.003), ("were", 0.003), ("her", 0.003),
        ("all", 0.003), ("she", 0.003), ("there", 0.003), ("would", 0.003), ("their", 0.003),
        ("we", 0.003), ("him", 0.002), ("been", 0.002), ("has", 0.002), ("when", 0.002),
        ("who", 0.002), ("will", 0.002), ("more", 0.002), ("no", 0.002), ("if", 0.002),
        ("out", 0.002), ("so", 0.002), ("said", 0.002), ("what", 0.002), ("up", 0.002),
        ("its", 0.002), ("about", 0.002), ("into", 0.002), ("than", 0.002), ("them", 0.002),
        ("can", 0.002), ("only", 0.002), ("other", 0.002), ("new", 0.002), ("some", 0.002),
        ("could", 0.002), ("time", 0.002), ("these", 0.002), ("two", 0.002), ("may", 0.002),
        ("then", 0.002), ("do", 0.002), ("first", 0.002), ("any", 0.002), ("my", 0.002),
        ("now", 0.002), ("such", 0.002), ("like", 0.002), ("our", 0.002), ("over", 0.002),
        ("man", 0.002), ("me", 0.002), ("even", 0.002), ("most", 0.002), ("made", 0.002),
        ("after", 0.002), ("also", 0.002), ("did", 0.002), ("many", 0.002), ("before", 0.002),
        ("must", 0.002), ("through", 0.002), ("back", 0.002), ("years", 0.002), ("where", 0.002),
        ("much", 0.002), ("your", 0.002), ("way", 0.002), ("well", 0.002), ("down", 0.002),
        ("should", 0.002), ("because", 0.002), ("each", 0.002), ("just", 0.002), ("those", 0.002),
        ("people", 0.002), ("mr", 0.002), ("how", 0.002), ("too", 0.002), ("little", 0.002),
        ("state", 0.002), ("good", 0.002), ("very", 0.002), ("make", 0.002), ("world", 0.002),
        ("still", 0.002), ("own", 0.002), ("see", 0.002), ("men", 0.002), ("work", 0.002),
        ("long", 0.002), ("get", 0.002), ("here", 0.002), ("between", 0.002), ("both", 0.002),
        ("life", 0.002), ("being", 0.002), ("under", 0.002), ("never", 0.002), ("day", 0.002),
        ("same", 0.002), ("another", 0.002), ("know", 0.002), ("while", 0.002), ("last", 0.002),
        ("might", 0.002), ("great", 0.002), ("old", 0.002), ("year", 0.002), ("off", 0.002),
        ("come", 0.002), ("since", 0.002), ("against", 0.002), ("go", 0.002), ("came", 0.002),
        ("right", 0.002), ("used", 0.002), ("take", 0.002), ("three", 0.002),
        // Technical / log vocabulary (prevents FPs on agent traffic)
        ("system", 0.002), ("error", 0.002), ("warning", 0.002), ("info", 0.002),
        ("status", 0.002), ("connected", 0.002), ("disconnected", 0.002), ("file", 0.002),
        ("data", 0.002), ("user", 0.002), ("message", 0.002), ("gateway", 0.002),
        ("conversation", 0.002), ("metadata", 0.002), ("true", 0.002), ("false", 0.002),
        ("null", 0.002), ("undefined", 0.002), ("object", 0.002), ("array", 0.002),
        ("string", 0.002), ("number", 0.002), ("json", 0.002), ("date", 0.002),
        ("timestamp", 0.002), ("log", 0.002), ("trace", 0.002), ("debug", 0.002),
        ("exception", 0.002),
        // Common prompt vocabulary
        ("write", 0.001), ("code", 0.001), ("function", 0.001), ("help", 0.001),
        ("calculate", 0.001), ("numbers", 0.001), ("recipe", 0.001), ("cake", 0.001),
        ("chocolate", 0.001), ("capital", 0.001), ("france", 0.001), ("summarize", 0.001),
        ("article", 0.001), ("explain", 0.001), ("translate", 0.001), ("hello", 0.005),
        ("hi", 0.005), ("please", 0.005),
        // Conversational words (prevents FPs on short benign messages)
        ("name", 0.003), ("show", 0.002), ("tell", 0.003), ("give", 0.002),
        ("ask", 0.002), ("want", 0.003), ("need", 0.003), ("thing", 0.002),
        ("think", 0.002), ("say", 0.003), ("thanks", 0.003), ("thank", 0.003),
        ("yes", 0.003), ("ok", 0.003), ("okay", 0.003), ("hey", 0.003),
        ("sure", 0.002), ("let", 0.002), ("why", 0.002), ("try", 0.002),
        ("look", 0.002), ("find", 0.002), ("really", 0.002), ("something", 0.002),
        ("anything", 0.002), ("everything", 0.002), ("nothing", 0.002), ("someone", 0.002),
        ("everyone", 0.002), ("today", 0.002), ("tomorrow", 0.002), ("yesterday", 0.002),
        ("morning", 0.002), ("night", 0.002), ("weather", 0.002), ("call", 0.002),
        ("send", 0.002), ("read", 0.002),
        // Pinned to the floor so override phrasing spikes perplexity
        ("ignore", 0.0001), ("previous", 0.0001), ("instruction", 0.0001),
        ("instructions", 0.0001),
    ];
    m.extend(entries.iter().copied());
    m
});

/// Curated common bigrams. When a bigram is known, its probability is
/// blended 50/50 with the word's unigram probability.
static COMMON_BIGRAMS: Lazy<HashMap<&'static str, f64>> = Lazy::new(|| {
    let mut m = HashMap::new();
    let entries: &[(&str, f64)] = &[
        ("of the", 0.01), ("in the", 0.008), ("to the", 0.005), ("on the", 0.004),
        ("and the", 0.003), ("for the", 0.003), ("to be", 0.003), ("is a", 0.002),
        ("how to", 0.002), ("can you", 0.002), ("help me", 0.002), ("write a", 0.002),
        ("for a", 0.002), ("what is", 0.002), ("is the", 0.002), ("capital of", 0.002),
    ];
    m.extend(entries.iter().copied());
    m
});

static WORD_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[a-z']+").expect("token regex"));

/// Lowercase alphabetic-plus-apostrophe runs.
fn tokenize(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    WORD_RUNS
        .find_iter(&lower)
        .map(|m| m.as_str().to_owned())
        .collect()
}

/// Perplexity as `exp(-mean log P(w))` over the token sequence.
fn calculate_perplexity(text: &str) -> f64 {
    let words = tokenize(text);
    if words.is_empty() {
        return 0.0;
    }

    let mut log_prob = 0.0;
    for (i, word) in words.iter().enumerate() {
        let unigram = COMMON_UNIGRAMS
            .get(word.as_str())
            .copied()
            .unwrap_or(FLOOR_PROBABILITY);

        let mut prob = unigram;
        if i > 0 {
            let bigram = format!("{} {}", words[i - 1], word);
            if let Some(&bigram_prob) = COMMON_BIGRAMS.get(bigram.as_str()) {
                prob = 0.5 * bigram_prob + 0.5 * unigram;
            }
        }

        log_prob += prob.ln();
    }

    (-log_prob / words.len() as f64).exp()
}

/// Run the perplexity layer. Inputs under [`MIN_INPUT_LENGTH`] chars are
/// skipped (score 0, unblocked).
pub fn detect_perplexity(text: &str, threshold: f64) -> LayerResult {
    if text.chars().count() < MIN_INPUT_LENGTH {
        return LayerResult::pass(0.0);
    }

    let perplexity = calculate_perplexity(text);

    if perplexity > threshold {
        return LayerResult::block(
            perplexity,
            format!(
                "High perplexity detected: {:.1} (threshold: {})",
                perplexity, threshold
            ),
        )
        .with_metadata(json!({ "perplexity": perplexity }));
    }

    LayerResult::pass(perplexity).with_metadata(json!({ "perplexity": perplexity }))
}
