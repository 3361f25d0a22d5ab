//! Hybrid retrieval
//!
//! Weighted fusion of keyword and vector signals. Results are unioned by
//! id, scored `0.3 * keyword + 0.7 * vector`, then re-numbered; each fused
//! result keeps its pre-fusion id in `source_id`.

use std::collections::HashMap;
use std::path::Path;

use crate::retrieval::{
    rank_results, EmbeddingSettings, KeywordRetriever, RetrievalResult, VectorRetriever,
};

/// Weight of the keyword signal in the composite score.
pub const KEYWORD_WEIGHT: f32 = 0.3;
/// Weight of the vector signal in the composite score.
pub const VECTOR_WEIGHT: f32 = 0.7;

/// Hybrid retriever combining both strategies over the same index
/// directory.
#[derive(Debug)]
pub struct HybridRetriever {
    keyword: KeywordRetriever,
    vector: VectorRetriever,
}

impl HybridRetriever {
    pub fn new(index_dir: &Path, embedding: &EmbeddingSettings) -> Self {
        Self {
            keyword: KeywordRetriever::load(index_dir),
            vector: VectorRetriever::new(index_dir, embedding),
        }
    }

    /// Run both strategies with the same `top_k` and fuse their results.
    pub fn retrieve(&self, query: &str, top_k: usize) -> Vec<RetrievalResult> {
        let keyword_results = self.keyword.retrieve(query, top_k);
        let vector_results = self.vector.retrieve(query, top_k);

        tracing::debug!(
            keyword = keyword_results.len(),
            vector = vector_results.len(),
            "fusing retrieval results"
        );
        fuse(keyword_results, vector_results, top_k)
    }
}

/// Accumulator for one unioned document.
struct FusedEntry {
    id: String,
    content: String,
    metadata: HashMap<String, String>,
    keyword_score: f32,
    vector_score: f32,
}

/// Union both result lists by id and rank by composite score.
///
/// On an id collision the keyword side supplies content and metadata.
/// The fused list is re-numbered `doc_0`, `doc_1`, ... in rank order, with
/// the pre-fusion id preserved in `source_id`.
pub(crate) fn fuse(
    keyword_results: Vec<RetrievalResult>,
    vector_results: Vec<RetrievalResult>,
    top_k: usize,
) -> Vec<RetrievalResult> {
    let mut entries: Vec<FusedEntry> = Vec::new();
    let mut index_by_id: HashMap<String, usize> = HashMap::new();

    for result in keyword_results {
        index_by_id.insert(result.id.clone(), entries.len());
        entries.push(FusedEntry {
            id: result.id,
            content: result.content,
            metadata: result.metadata,
            keyword_score: result.score,
            vector_score: 0.0,
        });
    }

    for result in vector_results {
        match index_by_id.get(&result.id) {
            Some(&idx) => entries[idx].vector_score = result.score,
            None => {
                index_by_id.insert(result.id.clone(), entries.len());
                entries.push(FusedEntry {
                    id: result.id,
                    content: result.content,
                    metadata: result.metadata,
                    keyword_score: 0.0,
                    vector_score: result.score,
                });
            }
        }
    }

    let mut fused: Vec<RetrievalResult> = entries
        .into_iter()
        .map(|entry| RetrievalResult {
            id: entry.id,
            content: entry.content,
            score: entry.keyword_score * KEYWORD_WEIGHT + entry.vector_score * VECTOR_WEIGHT,
            metadata: entry.metadata,
            source_id: None,
        })
        .collect();

    rank_results(&mut fused, top_k);

    for (rank, result) in fused.iter_mut().enumerate() {
        result.source_id = Some(std::mem::take(&mut result.id));
        result.id = format!("doc_{rank}");
    }
    fused
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_fuse_weights_and_order() {
        let keyword = vec![
            RetrievalResult::new("doc_0", "shared doc", 0.5),
            RetrievalResult::new("kw_1", "keyword only", 1.0),
        ];
        let vector = vec![
            RetrievalResult::new("doc_0", "vector copy of shared doc", 0.8),
            RetrievalResult::new("vec_2", "vector only", 0.6),
        ];

        let fused = fuse(keyword, vector, 5);

        assert_eq!(fused.len(), 3);
        // shared: 0.3*0.5 + 0.7*0.8 = 0.71, vector-only: 0.42, keyword-only: 0.30
        assert_eq!(fused[0].source_id.as_deref(), Some("doc_0"));
        assert!((fused[0].score - 0.71).abs() < 1e-6);
        assert_eq!(fused[1].source_id.as_deref(), Some("vec_2"));
        assert!((fused[1].score - 0.42).abs() < 1e-6);
        assert_eq!(fused[2].source_id.as_deref(), Some("kw_1"));
        assert!((fused[2].score - 0.30).abs() < 1e-6);
    }

    #[test]
    fn test_fuse_keyword_side_wins_collisions() {
        let keyword = vec![RetrievalResult::new("doc_0", "keyword content", 0.4)
            .with_metadata("source", "keyword-index")];
        let vector = vec![RetrievalResult::new("doc_0", "vector content", 0.9)
            .with_metadata("source", "vector-store")];

        let fused = fuse(keyword, vector, 5);

        assert_eq!(fused.len(), 1);
        assert_eq!(fused[0].content, "keyword content");
        assert_eq!(fused[0].metadata.get("source").unwrap(), "keyword-index");
    }

    #[test]
    fn test_fuse_renumbers_in_rank_order() {
        let keyword = vec![RetrievalResult::new("orig_b", "b", 0.2)];
        let vector = vec![RetrievalResult::new("orig_a", "a", 0.9)];

        let fused = fuse(keyword, vector, 5);

        assert_eq!(fused[0].id, "doc_0");
        assert_eq!(fused[0].source_id.as_deref(), Some("orig_a"));
        assert_eq!(fused[1].id, "doc_1");
        assert_eq!(fused[1].source_id.as_deref(), Some("orig_b"));
    }

    #[test]
    fn test_fuse_truncates_to_top_k() {
        let keyword = (0..4)
            .map(|i| RetrievalResult::new(format!("kw_{i}"), "k", 0.9 - i as f32 * 0.1))
            .collect();
        let vector = (0..4)
            .map(|i| RetrievalResult::new(format!("vec_{i}"), "v", 0.9 - i as f32 * 0.1))
            .collect();

        let fused = fuse(keyword, vector, 3);

        assert_eq!(fused.len(), 3);
    }

    #[test]
    fn test_fuse_empty_sides() {
        assert!(fuse(Vec::new(), Vec::new(), 5).is_empty());

        let vector_only = fuse(
            Vec::new(),
            vec![RetrievalResult::new("v", "text", 0.5)],
            5,
        );
        assert_eq!(vector_only.len(), 1);
        assert!((vector_only[0].score - 0.35).abs() < 1e-6);
    }

    #[test]
    fn test_hybrid_end_to_end_over_index_dir() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("keyword_index.json"),
            r#"{"doc_0": {"content": "alpha beta"}, "doc_1": {"content": "gamma delta"}}"#,
        )
        .unwrap();

        let retriever = HybridRetriever::new(dir.path(), &EmbeddingSettings::default());
        let results = retriever.retrieve("alpha", 2);

        assert_eq!(results.len(), 2);
        // Keyword scores doc_0 at 0.5; placeholder vector scores doc_0 at
        // 0.8 and doc_1 at 0.7. Fused: 0.71 vs 0.49.
        assert_eq!(results[0].content, "alpha beta");
        assert!((results[0].score - 0.71).abs() < 1e-6);
        assert_eq!(results[0].source_id.as_deref(), Some("doc_0"));
        assert!((results[1].score - 0.49).abs() < 1e-6);
        assert!(results[0].score >= results[1].score);
    }
}
