//! Keyword retrieval
//!
//! Token-overlap scoring over an in-memory snippet index. The index is a
//! flat list loaded once at construction, either from the indexing
//! pipeline's CSV tables or from a plain JSON file.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::retrieval::{rank_results, RetrievalResult};

/// Text-unit table produced by the indexing pipeline.
const TEXT_UNITS_TABLE: &str = "output/text_units.csv";
/// Companion document table joined on `document_id`.
const DOCUMENTS_TABLE: &str = "output/documents.csv";
/// Plain JSON index used when no tables are present.
const JSON_INDEX: &str = "keyword_index.json";

/// Score assigned to leading entries when no document overlaps the query.
pub const FALLBACK_SCORE: f32 = 0.5;

/// One indexed snippet.
#[derive(Debug, Clone)]
struct IndexEntry {
    id: String,
    content: String,
    metadata: HashMap<String, String>,
}

impl IndexEntry {
    fn to_result(&self, score: f32) -> RetrievalResult {
        RetrievalResult {
            id: self.id.clone(),
            content: self.content.clone(),
            score,
            metadata: self.metadata.clone(),
            source_id: None,
        }
    }
}

/// JSON index value shape: `{"doc_0": {"content": ..., "metadata": {...}}}`.
#[derive(Debug, Deserialize)]
struct JsonEntry {
    #[serde(default)]
    content: String,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

/// Keyword retriever scoring by lowercase token overlap.
#[derive(Debug)]
pub struct KeywordRetriever {
    /// Entries in deterministic order: CSV row order, or id order for the
    /// JSON index. The zero-overlap fallback serves the leading entries.
    entries: Vec<IndexEntry>,
}

impl KeywordRetriever {
    /// Load the index under `index_dir`.
    ///
    /// Tries the CSV tables first, then the JSON index; an unreadable or
    /// absent index degrades to an empty retriever rather than failing.
    pub fn load(index_dir: &Path) -> Self {
        let entries = load_entries(index_dir);
        tracing::debug!(
            index_dir = %index_dir.display(),
            entries = entries.len(),
            "keyword index loaded"
        );
        Self { entries }
    }

    /// Number of indexed snippets.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Score every indexed snippet against `query` and return the best
    /// `top_k`, highest score first.
    ///
    /// Score is `|overlap| / (|query tokens| + 1)` over lowercase
    /// whitespace-split token sets. Snippets with zero overlap are dropped;
    /// if nothing overlaps at all (and the index is non-empty) the leading
    /// `top_k` entries are returned at [`FALLBACK_SCORE`] so callers always
    /// see context when the index has any.
    pub fn retrieve(&self, query: &str, top_k: usize) -> Vec<RetrievalResult> {
        let query_tokens = tokenize(query);

        let mut results: Vec<RetrievalResult> = Vec::new();
        for entry in &self.entries {
            let doc_tokens = tokenize(&entry.content);
            let overlap = query_tokens.intersection(&doc_tokens).count();
            let score = overlap as f32 / (query_tokens.len() as f32 + 1.0);
            if score > 0.0 {
                results.push(entry.to_result(score));
            }
        }

        if results.is_empty() && !self.entries.is_empty() {
            results = self
                .entries
                .iter()
                .take(top_k)
                .map(|entry| entry.to_result(FALLBACK_SCORE))
                .collect();
        }

        rank_results(&mut results, top_k);
        results
    }
}

fn tokenize(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

fn load_entries(index_dir: &Path) -> Vec<IndexEntry> {
    let table_path = index_dir.join(TEXT_UNITS_TABLE);
    if table_path.exists() {
        match load_from_tables(index_dir, &table_path) {
            Ok(entries) => return entries,
            Err(e) => {
                tracing::warn!(
                    table = %table_path.display(),
                    "failed to load text-unit table, trying JSON index: {e:#}"
                );
            }
        }
    }

    let json_path = index_dir.join(JSON_INDEX);
    if json_path.exists() {
        match load_from_json(&json_path) {
            Ok(entries) => return entries,
            Err(e) => {
                tracing::warn!(
                    index = %json_path.display(),
                    "failed to load JSON keyword index: {e:#}"
                );
            }
        }
    }

    Vec::new()
}

/// Load the text-unit table, joining document-level provenance when the
/// companion document table is present. Entries keep CSV row order and are
/// numbered `doc_0`, `doc_1`, ... by row.
fn load_from_tables(index_dir: &Path, table_path: &Path) -> Result<Vec<IndexEntry>> {
    let mut reader = csv::Reader::from_path(table_path)
        .with_context(|| format!("open {}", table_path.display()))?;

    let headers = reader.headers().context("read text-unit headers")?.clone();
    let column = |name: &str| headers.iter().position(|h| h == name);

    let text_col = column("text")
        .with_context(|| format!("{} has no `text` column", table_path.display()))?;
    let id_col = column("id");
    let source_col = column("source");
    let document_id_col = column("document_id");

    let document_sources = load_document_sources(&index_dir.join(DOCUMENTS_TABLE))?;

    let mut entries = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("read text-unit row {idx}"))?;
        let field = |col: Option<usize>| {
            col.and_then(|c| record.get(c))
                .unwrap_or_default()
                .to_string()
        };

        let mut metadata = HashMap::new();
        metadata.insert(
            "source".to_string(),
            source_col
                .and_then(|c| record.get(c))
                .unwrap_or("graphrag")
                .to_string(),
        );
        let document_id = field(document_id_col);
        metadata.insert("document_id".to_string(), document_id.clone());
        metadata.insert("text_unit_id".to_string(), field(id_col));
        if let Some(doc_source) = document_sources.get(&document_id) {
            metadata.insert("document_source".to_string(), doc_source.clone());
        }

        entries.push(IndexEntry {
            id: format!("doc_{idx}"),
            content: record.get(text_col).unwrap_or_default().to_string(),
            metadata,
        });
    }

    tracing::info!(
        table = %table_path.display(),
        entries = entries.len(),
        "loaded keyword index from text-unit table"
    );
    Ok(entries)
}

/// `document_id -> source` from the document table. Missing table or missing
/// columns just mean no document-level provenance.
fn load_document_sources(path: &Path) -> Result<HashMap<String, String>> {
    let mut sources = HashMap::new();
    if !path.exists() {
        return Ok(sources);
    }

    let mut reader =
        csv::Reader::from_path(path).with_context(|| format!("open {}", path.display()))?;
    let headers = reader.headers().context("read document headers")?.clone();
    let id_col = headers.iter().position(|h| h == "id");
    let source_col = headers.iter().position(|h| h == "source");

    let (Some(id_col), Some(source_col)) = (id_col, source_col) else {
        return Ok(sources);
    };

    for record in reader.records() {
        let record = record.context("read document row")?;
        if let (Some(id), Some(source)) = (record.get(id_col), record.get(source_col)) {
            sources.insert(id.to_string(), source.to_string());
        }
    }
    Ok(sources)
}

/// Load the JSON index. A `BTreeMap` keeps entry order deterministic
/// (sorted by id) regardless of the file's key order.
fn load_from_json(path: &Path) -> Result<Vec<IndexEntry>> {
    let raw = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let parsed: BTreeMap<String, JsonEntry> =
        serde_json::from_str(&raw).with_context(|| format!("parse {}", path.display()))?;

    Ok(parsed
        .into_iter()
        .map(|(id, entry)| IndexEntry {
            id,
            content: entry.content,
            metadata: entry.metadata,
        })
        .collect())
}
