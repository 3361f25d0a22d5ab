//! Retrieval engines
//!
//! Implements keyword (token overlap), vector (embedding similarity), and
//! hybrid (weighted fusion) retrieval strategies. Retrieval is deliberately
//! infallible: a missing or unreadable index degrades to fewer (or zero)
//! results rather than failing the query.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::RagError;

pub mod hybrid;
pub mod keyword;
pub mod vector;

pub use hybrid::HybridRetriever;
pub use keyword::KeywordRetriever;
pub use vector::{EmbeddingBackend, EmbeddingSettings, HashEmbedder, VectorRetriever};

/// One retrieved snippet with its relevance score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    /// Identifier within this result list (`doc_0`, `doc_1`, ...).
    pub id: String,
    /// The snippet text used to build the answer context.
    pub content: String,
    /// Relevance score, non-negative, higher is better.
    pub score: f32,
    /// Provenance fields (`source`, `document_id`, ...).
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
    /// Pre-fusion identifier, set by the hybrid retriever when it re-numbers
    /// fused results.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
}

impl RetrievalResult {
    pub fn new(id: impl Into<String>, content: impl Into<String>, score: f32) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            score,
            metadata: HashMap::new(),
            source_id: None,
        }
    }

    /// Attach a metadata entry.
    pub fn with_metadata(mut self, key: &str, value: &str) -> Self {
        self.metadata.insert(key.to_string(), value.to_string());
        self
    }
}

/// Retrieval strategy selector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetrieverKind {
    /// Token-overlap scoring over the keyword index.
    Keyword,
    /// Embedding-similarity scoring over the vector store.
    Vector,
    /// Weighted fusion of keyword and vector results.
    #[default]
    Hybrid,
}

impl RetrieverKind {
    /// All accepted strategy names, in the order they are advertised.
    pub const NAMES: [&'static str; 3] = ["keyword", "vector", "hybrid"];

    /// Every strategy, in the same order as [`NAMES`](Self::NAMES).
    pub const fn all() -> [Self; 3] {
        [RetrieverKind::Keyword, RetrieverKind::Vector, RetrieverKind::Hybrid]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RetrieverKind::Keyword => "keyword",
            RetrieverKind::Vector => "vector",
            RetrieverKind::Hybrid => "hybrid",
        }
    }
}

impl fmt::Display for RetrieverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RetrieverKind {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "keyword" => Ok(RetrieverKind::Keyword),
            "vector" => Ok(RetrieverKind::Vector),
            "hybrid" => Ok(RetrieverKind::Hybrid),
            other => Err(RagError::UnknownRetriever(other.to_string())),
        }
    }
}

/// Construction settings shared by all retrieval strategies.
#[derive(Debug, Clone, Default)]
pub struct RetrieverConfig {
    /// Directory the index artifacts live under.
    pub index_dir: PathBuf,
    /// Embedding seam for the vector strategy.
    pub embedding: EmbeddingSettings,
}

impl RetrieverConfig {
    pub fn new(index_dir: impl Into<PathBuf>) -> Self {
        Self {
            index_dir: index_dir.into(),
            embedding: EmbeddingSettings::default(),
        }
    }

    /// Set the embedding settings for the vector strategy.
    pub fn with_embedding(mut self, embedding: EmbeddingSettings) -> Self {
        self.embedding = embedding;
        self
    }
}

/// A constructed retrieval strategy.
///
/// Dispatch is a closed enum rather than a trait object: the set of
/// strategies is fixed and callers get exhaustive matching plus a cheap
/// [`kind`](Retriever::kind) accessor for free.
#[derive(Debug)]
pub enum Retriever {
    Keyword(KeywordRetriever),
    Vector(VectorRetriever),
    Hybrid(HybridRetriever),
}

impl Retriever {
    /// Build the strategy named by `kind` over `config.index_dir`.
    ///
    /// Construction never fails: index artifacts that are missing or
    /// unreadable leave the strategy with an empty index.
    pub fn create(kind: RetrieverKind, config: &RetrieverConfig) -> Self {
        match kind {
            RetrieverKind::Keyword => {
                Retriever::Keyword(KeywordRetriever::load(&config.index_dir))
            }
            RetrieverKind::Vector => {
                Retriever::Vector(VectorRetriever::new(&config.index_dir, &config.embedding))
            }
            RetrieverKind::Hybrid => {
                Retriever::Hybrid(HybridRetriever::new(&config.index_dir, &config.embedding))
            }
        }
    }

    /// Retrieve up to `top_k` snippets ranked by descending score.
    pub fn retrieve(&self, query: &str, top_k: usize) -> Vec<RetrievalResult> {
        match self {
            Retriever::Keyword(r) => r.retrieve(query, top_k),
            Retriever::Vector(r) => r.retrieve(query, top_k),
            Retriever::Hybrid(r) => r.retrieve(query, top_k),
        }
    }

    pub fn kind(&self) -> RetrieverKind {
        match self {
            Retriever::Keyword(_) => RetrieverKind::Keyword,
            Retriever::Vector(_) => RetrieverKind::Vector,
            Retriever::Hybrid(_) => RetrieverKind::Hybrid,
        }
    }
}

/// Sort by descending score (stable, so equal scores keep their incoming
/// order) and truncate to `top_k`.
pub(crate) fn rank_results(results: &mut Vec<RetrievalResult>, top_k: usize) {
    results.sort_by(|a, b| b.score.total_cmp(&a.score));
    results.truncate(top_k);
}
