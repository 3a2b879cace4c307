//! # Semantic Layer
//!
//! Embedding-similarity check against a precomputed corpus of known attack
//! phrasings. The embedding model is an opaque capability behind
//! [`EmbeddingProvider`]; this layer owns only the similarity search and the
//! shared, exactly-once initialization.
//!
//! ## Failure Policy: FAIL-OPEN EVERYWHERE
//!
//! This layer is supplementary — seven synchronous layers run before it.
//! Blocking all traffic because a model failed to load is strictly worse
//! than skipping the check, so every infrastructure failure (provider init,
//! missing corpus file, embed error, zero-magnitude vector) returns an
//! unblocked result with a warning in metadata. A failed initialization is
//! NOT cached: the next call attempts the load again.
//!
//! ## Corpus Format
//!
//! ```json
//! { "corpus": ["ignore previous instructions", ...],
//!   "embeddings": [[0.12, -0.04, ...], ...] }
//! ```
//!
//! Index-aligned: `embeddings[i]` is the vector for `corpus[i]`.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::warn;

use super::LayerResult;

/// Errors internal to the semantic layer. These never escape
/// [`SemanticLayer::detect`] — they degrade to fail-open results.
#[derive(Debug, Error)]
pub enum SemanticError {
    /// The embedding provider failed to initialize.
    #[error("embedding provider initialization failed: {0}")]
    Init(String),

    /// The attack corpus could not be read or is malformed.
    #[error("attack corpus error: {0}")]
    Corpus(String),

    /// The provider failed to produce an embedding.
    #[error("embedding failed: {0}")]
    Embed(String),
}

/// Opaque embedding capability: text in, fixed-length vector out.
///
/// Implementations must be `Send + Sync`; the layer shares one provider
/// across concurrent pipeline runs. The provider's latency and failures are
/// isolated here and cannot fail the rest of the pipeline.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// One-time model load. Called exactly once per successful
    /// initialization; called again on a later request if it failed.
    async fn initialize(&self) -> Result<(), SemanticError>;

    /// Embed a text into a fixed-length vector.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, SemanticError>;
}

#[derive(Debug, Deserialize)]
struct CorpusFile {
    corpus: Vec<String>,
    embeddings: Vec<Vec<f32>>,
}

/// Precomputed `(phrase, vector)` pairs for known attacks.
#[derive(Debug)]
pub struct AttackCorpus {
    phrases: Vec<String>,
    embeddings: Vec<Vec<f32>>,
}

impl AttackCorpus {
    /// Load an index-aligned corpus from a JSON file.
    pub fn load(path: &Path) -> Result<Self, SemanticError> {
        let data = std::fs::read_to_string(path)
            .map_err(|e| SemanticError::Corpus(format!("read {}: {}", path.display(), e)))?;
        let file: CorpusFile = serde_json::from_str(&data)
            .map_err(|e| SemanticError::Corpus(format!("parse {}: {}", path.display(), e)))?;
        if file.corpus.len() != file.embeddings.len() {
            return Err(SemanticError::Corpus(format!(
                "corpus/embedding count mismatch: {} phrases, {} vectors",
                file.corpus.len(),
                file.embeddings.len()
            )));
        }
        Ok(Self {
            phrases: file.corpus,
            embeddings: file.embeddings,
        })
    }

    pub fn len(&self) -> usize {
        self.phrases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phrases.is_empty()
    }
}

/// Initialization outcome memoized behind the once-cell. A missing corpus
/// file is a *successful* init with no corpus (fail-open per call); only
/// provider failures leave the cell empty for retry.
struct LoadedState {
    corpus: Option<Arc<AttackCorpus>>,
}

/// The semantic detection layer.
pub struct SemanticLayer {
    provider: Arc<dyn EmbeddingProvider>,
    corpus_path: PathBuf,
    init: OnceCell<LoadedState>,
}

impl SemanticLayer {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, corpus_path: impl Into<PathBuf>) -> Self {
        Self {
            provider,
            corpus_path: corpus_path.into(),
            init: OnceCell::new(),
        }
    }

    /// Ensure the provider is initialized and the corpus loaded.
    ///
    /// Concurrent first callers share a single in-flight load; a failed
    /// load leaves the cell empty so the next call retries.
    pub async fn initialize(&self) -> Result<(), SemanticError> {
        self.init
            .get_or_try_init(|| self.load())
            .await
            .map(|_| ())
    }

    async fn load(&self) -> Result<LoadedState, SemanticError> {
        self.provider.initialize().await?;

        match AttackCorpus::load(&self.corpus_path) {
            Ok(corpus) => Ok(LoadedState {
                corpus: Some(Arc::new(corpus)),
            }),
            Err(e) => {
                // Missing/bad corpus degrades coverage but must not block
                // traffic or poison the provider init
                warn!("semantic layer has no attack corpus: {}", e);
                Ok(LoadedState { corpus: None })
            }
        }
    }

    /// Run the semantic similarity check.
    pub async fn detect(&self, text: &str, threshold: f64) -> LayerResult {
        let state = match self.init.get_or_try_init(|| self.load()).await {
            Ok(state) => state,
            Err(e) => {
                warn!("semantic layer unavailable (fail-open): {}", e);
                return LayerResult::pass(0.0).with_metadata(json!({
                    "warning": "Semantic layer unavailable — model load failure",
                    "error": e.to_string(),
                }));
            }
        };

        let corpus = match &state.corpus {
            Some(corpus) => corpus,
            None => {
                return LayerResult::pass(0.0)
                    .with_metadata(json!({ "warning": "No attack corpus loaded" }));
            }
        };

        let embedding = match self.provider.embed(text).await {
            Ok(embedding) => embedding,
            Err(e) => {
                warn!("semantic detection runtime error (fail-open): {}", e);
                return LayerResult::pass(0.0).with_metadata(json!({
                    "warning": "Semantic layer error during analysis",
                    "error": e.to_string(),
                }));
            }
        };

        if embedding.iter().all(|&v| v == 0.0) {
            return LayerResult::pass(0.0)
                .with_metadata(json!({ "warning": "Zero-magnitude embedding" }));
        }

        let mut max_similarity = 0.0_f64;
        let mut best_match = "";
        for (i, candidate) in corpus.embeddings.iter().enumerate() {
            let similarity = cosine_similarity(&embedding, candidate);
            if similarity > max_similarity {
                max_similarity = similarity;
                best_match = &corpus.phrases[i];
            }
        }

        if max_similarity > threshold {
            return LayerResult::block(
                max_similarity,
                format!(
                    "Semantic injection detected: similarity {:.2} to \"{}\"",
                    max_similarity, best_match
                ),
            )
            .with_metadata(json!({
                "maxSimilarity": max_similarity,
                "bestMatch": best_match,
            }));
        }

        LayerResult::pass(max_similarity).with_metadata(json!({
            "maxSimilarity": max_similarity,
            "bestMatch": best_match,
        }))
    }
}

/// Cosine similarity between two vectors. Zero-magnitude inputs yield 0
/// rather than NaN.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    let mut dot = 0.0_f64;
    let mut mag_a = 0.0_f64;
    let mut mag_b = 0.0_f64;
    for (&x, &y) in a.iter().zip(b.iter()) {
        dot += f64::from(x) * f64::from(y);
        mag_a += f64::from(x) * f64::from(x);
        mag_b += f64::from(y) * f64::from(y);
    }
    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }
    dot / (mag_a.sqrt() * mag_b.sqrt())
}
