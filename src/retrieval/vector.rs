//! Vector retrieval
//!
//! Embedding-similarity scoring over a JSON embedding store. Without a
//! configured backend the retriever serves deterministic placeholder
//! results, which keeps the full pipeline exercisable offline; with a
//! backend it scores stored embeddings by cosine similarity.

use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::hash::{Hash, Hasher};
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::RagError;
use crate::retrieval::{rank_results, RetrievalResult};

/// Embedding store file under the index directory.
const EMBEDDINGS_STORE: &str = "embeddings.json";

/// Highest placeholder score; each subsequent rank drops by
/// [`PLACEHOLDER_SCORE_STEP`], floored at zero.
pub const PLACEHOLDER_SCORE_BASE: f32 = 0.8;
pub const PLACEHOLDER_SCORE_STEP: f32 = 0.1;

/// Trait for embedding text into vectors.
///
/// The vector retriever only needs single-text embedding; batching and
/// model management stay behind whatever implements this.
pub trait EmbeddingBackend: Send + Sync {
    /// Embed a single text.
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Get the embedding dimension.
    fn dimension(&self) -> usize;

    /// Get the backend name.
    fn name(&self) -> &str;
}

/// Built-in embedding backend selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackendKind {
    /// Token-hashing bag-of-words embedder; no model files required.
    Hash,
}

impl EmbeddingBackendKind {
    pub const NAMES: [&'static str; 1] = ["hash"];

    pub fn as_str(&self) -> &'static str {
        match self {
            EmbeddingBackendKind::Hash => "hash",
        }
    }
}

impl fmt::Display for EmbeddingBackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EmbeddingBackendKind {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hash" => Ok(EmbeddingBackendKind::Hash),
            other => Err(RagError::UnknownEmbeddingBackend(other.to_string())),
        }
    }
}

/// Embedding configuration for the vector strategy.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// Backend to score with; `None` selects placeholder results.
    pub backend: Option<EmbeddingBackendKind>,
    /// Embedding dimension for built-in backends.
    pub dimension: usize,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            backend: None,
            dimension: 384,
        }
    }
}

/// Token-hashing embedder (bag of hashed tokens, TF weighted, L2
/// normalized). Deterministic and model-free, so it also serves as the
/// test backend.
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn generate(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0; self.dimension];

        let tokens: Vec<&str> = text
            .split(|c: char| c.is_whitespace() || c.is_ascii_punctuation())
            .filter(|s| !s.is_empty())
            .collect();
        if tokens.is_empty() {
            return embedding;
        }

        for token in &tokens {
            let mut hasher = DefaultHasher::new();
            token.to_lowercase().hash(&mut hasher);
            let idx = (hasher.finish() as usize) % self.dimension;
            embedding[idx] += 1.0;
        }

        let total = tokens.len() as f32;
        for val in embedding.iter_mut() {
            *val /= total;
        }
        normalize_embedding(&mut embedding);
        embedding
    }
}

impl EmbeddingBackend for HashEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.generate(text))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        "hash"
    }
}

/// Scale an embedding to unit length in place.
pub fn normalize_embedding(embedding: &mut [f32]) {
    let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for val in embedding.iter_mut() {
            *val /= norm;
        }
    }
}

/// Cosine similarity between two embeddings; 0.0 for mismatched lengths or
/// zero-norm inputs.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a > 0.0 && norm_b > 0.0 {
        dot / (norm_a * norm_b)
    } else {
        0.0
    }
}

/// One stored embedding, as serialized in `embeddings.json`.
#[derive(Debug, Clone, Deserialize)]
struct StoredEntry {
    #[serde(default)]
    content: String,
    embedding: Vec<f32>,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

/// Vector retriever over the embedding store.
pub struct VectorRetriever {
    backend: Option<Arc<dyn EmbeddingBackend>>,
    /// Stored embeddings sorted by id; empty when no backend is configured
    /// or the store is absent.
    entries: Vec<(String, StoredEntry)>,
}

impl fmt::Debug for VectorRetriever {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VectorRetriever")
            .field("backend", &self.backend.as_ref().map(|b| b.name()))
            .field("entries", &self.entries.len())
            .finish()
    }
}

impl VectorRetriever {
    /// Build a retriever per `settings`. With no backend configured the
    /// store is not read at all; retrieval serves placeholders.
    pub fn new(index_dir: &Path, settings: &EmbeddingSettings) -> Self {
        match settings.backend {
            Some(EmbeddingBackendKind::Hash) => Self::with_backend(
                index_dir,
                Arc::new(HashEmbedder::new(settings.dimension)),
            ),
            None => Self {
                backend: None,
                entries: Vec::new(),
            },
        }
    }

    /// Build a retriever around a caller-supplied backend.
    pub fn with_backend(index_dir: &Path, backend: Arc<dyn EmbeddingBackend>) -> Self {
        let entries = load_store(&index_dir.join(EMBEDDINGS_STORE));
        Self {
            backend: Some(backend),
            entries,
        }
    }

    /// Whether real similarity scoring is active.
    pub fn has_backend(&self) -> bool {
        self.backend.is_some()
    }

    /// Retrieve up to `top_k` results, highest score first.
    ///
    /// Placeholder mode returns `top_k` synthetic snippets scored
    /// `0.8, 0.7, ...` (floored at zero). Backend mode scores every stored
    /// embedding by cosine similarity, clamped to `[0, 1]`.
    pub fn retrieve(&self, query: &str, top_k: usize) -> Vec<RetrievalResult> {
        let Some(backend) = &self.backend else {
            return placeholder_results(top_k);
        };

        let query_embedding = match backend.embed(query) {
            Ok(embedding) => embedding,
            Err(e) => {
                tracing::warn!(backend = backend.name(), "query embedding failed: {e:#}");
                return Vec::new();
            }
        };

        let mut results: Vec<RetrievalResult> = self
            .entries
            .iter()
            .map(|(id, entry)| RetrievalResult {
                id: id.clone(),
                content: entry.content.clone(),
                score: cosine_similarity(&query_embedding, &entry.embedding).clamp(0.0, 1.0),
                metadata: entry.metadata.clone(),
                source_id: None,
            })
            .collect();

        rank_results(&mut results, top_k);
        results
    }
}

/// Deterministic synthetic results used when no backend is configured.
fn placeholder_results(top_k: usize) -> Vec<RetrievalResult> {
    (0..top_k)
        .map(|i| {
            let score =
                (PLACEHOLDER_SCORE_BASE - i as f32 * PLACEHOLDER_SCORE_STEP).max(0.0);
            RetrievalResult::new(
                format!("doc_{i}"),
                format!("Sample document content {i} with information related to the query"),
                score,
            )
            .with_metadata("source", "example")
        })
        .collect()
}

/// Load the embedding store; id order (`BTreeMap`) keeps scoring input
/// deterministic. Missing or unreadable stores degrade to empty.
fn load_store(path: &Path) -> Vec<(String, StoredEntry)> {
    if !path.exists() {
        return Vec::new();
    }

    match read_store(path) {
        Ok(entries) => {
            tracing::debug!(store = %path.display(), entries = entries.len(), "embedding store loaded");
            entries
        }
        Err(e) => {
            tracing::warn!(store = %path.display(), "failed to load embedding store: {e:#}");
            Vec::new()
        }
    }
}

fn read_store(path: &Path) -> Result<Vec<(String, StoredEntry)>> {
    let raw = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let parsed: BTreeMap<String, StoredEntry> =
        serde_json::from_str(&raw).with_context(|| format!("parse {}", path.display()))?;
    Ok(parsed.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_placeholder_scores_descend_from_base() {
        let retriever = VectorRetriever::new(Path::new("/nonexistent"), &EmbeddingSettings::default());
        let results = retriever.retrieve("any query", 3);

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].id, "doc_0");
        assert!((results[0].score - 0.8).abs() < 1e-6);
        assert!((results[1].score - 0.7).abs() < 1e-6);
        assert!((results[2].score - 0.6).abs() < 1e-6);
        assert_eq!(results[0].metadata.get("source").unwrap(), "example");
    }

    #[test]
    fn test_placeholder_scores_never_negative() {
        let retriever = VectorRetriever::new(Path::new("/nonexistent"), &EmbeddingSettings::default());
        let results = retriever.retrieve("any query", 12);

        assert_eq!(results.len(), 12);
        assert!(results.iter().all(|r| r.score >= 0.0));
        assert_eq!(results.last().unwrap().score, 0.0);
    }

    #[test]
    fn test_hash_embedder_is_deterministic() {
        let embedder = HashEmbedder::new(64);

        let a = embedder.embed("the quick brown fox").unwrap();
        let b = embedder.embed("the quick brown fox").unwrap();

        assert_eq!(a.len(), 64);
        assert_eq!(a, b);
    }

    #[test]
    fn test_hash_embedder_output_is_normalized() {
        let embedder = HashEmbedder::new(64);
        let embedding = embedder.embed("normalize this text please").unwrap();

        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_cosine_similarity_bounds() {
        let embedder = HashEmbedder::new(64);
        let a = embedder.embed("alpha beta gamma").unwrap();

        assert!((cosine_similarity(&a, &a) - 1.0).abs() < 1e-5);
        assert_eq!(cosine_similarity(&a, &[0.0; 64]), 0.0);
        assert_eq!(cosine_similarity(&a, &[1.0, 2.0]), 0.0);
    }

    #[test]
    fn test_backend_mode_ranks_by_similarity() {
        let dir = tempdir().unwrap();
        let embedder = HashEmbedder::new(128);
        let docs = [
            ("doc_a", "rust ownership and borrowing rules"),
            ("doc_b", "gardening tips for tomato plants"),
        ];

        let store: serde_json::Map<String, serde_json::Value> = docs
            .iter()
            .map(|(id, content)| {
                let embedding = embedder.embed(content).unwrap();
                (
                    id.to_string(),
                    serde_json::json!({ "content": content, "embedding": embedding }),
                )
            })
            .collect();
        std::fs::write(
            dir.path().join(EMBEDDINGS_STORE),
            serde_json::Value::Object(store).to_string(),
        )
        .unwrap();

        let settings = EmbeddingSettings {
            backend: Some(EmbeddingBackendKind::Hash),
            dimension: 128,
        };
        let retriever = VectorRetriever::new(dir.path(), &settings);
        let results = retriever.retrieve("rust ownership and borrowing rules", 2);

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, "doc_a");
        assert!((results[0].score - 1.0).abs() < 1e-4);
        assert!(results[1].score < results[0].score);
    }

    #[test]
    fn test_backend_mode_with_missing_store_is_empty() {
        let dir = tempdir().unwrap();
        let settings = EmbeddingSettings {
            backend: Some(EmbeddingBackendKind::Hash),
            dimension: 64,
        };

        let retriever = VectorRetriever::new(dir.path(), &settings);

        assert!(retriever.has_backend());
        assert!(retriever.retrieve("query", 5).is_empty());
    }

    #[test]
    fn test_backend_kind_parsing() {
        assert_eq!("hash".parse::<EmbeddingBackendKind>().unwrap(), EmbeddingBackendKind::Hash);
        assert!("bert".parse::<EmbeddingBackendKind>().is_err());
    }
}
