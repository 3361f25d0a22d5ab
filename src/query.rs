//! Query and outcome types
//!
//! Defines the input to a pipeline run and the result bundle it returns,
//! including the structured generation outcome that replaces plain
//! degraded-text answers.

use serde::{Deserialize, Serialize};

use crate::config::DEFAULT_TOP_K;
use crate::generation::GenerationParams;
use crate::retrieval::RetrievalResult;

/// Marker prefixing degraded answer text produced when generation fails.
pub const GENERATION_FAILURE_MARKER: &str = "[generation failed]";

/// Input for one RAG query.
#[derive(Debug, Clone)]
pub struct RagQuery {
    /// The user's question.
    pub query: String,
    /// Number of documents to retrieve.
    pub top_k: usize,
    /// Sampling parameters forwarded to the generator.
    pub params: GenerationParams,
}

impl RagQuery {
    /// Create a query with default `top_k` and sampling parameters.
    pub fn new(query: &str) -> Self {
        Self {
            query: query.to_string(),
            top_k: DEFAULT_TOP_K,
            params: GenerationParams::default(),
        }
    }

    /// Set the number of documents to retrieve.
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Set the sampling parameters.
    pub fn with_params(mut self, params: GenerationParams) -> Self {
        self.params = params;
        self
    }
}

/// Why a generation call degraded instead of producing a model answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum GenerationFailure {
    /// The request did not complete within the client timeout.
    #[error("request timed out")]
    Timeout,
    /// Connection-level failure (DNS, refused, TLS, ...).
    #[error("transport error: {0}")]
    Transport(String),
    /// The endpoint answered with a non-success status.
    #[error("endpoint returned status {0}")]
    Status(u16),
    /// The response body did not match the chat-completion shape.
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

/// Outcome of one generation call.
///
/// Generation never escalates transport problems into errors; a failed call
/// yields marker-prefixed text plus the structured failure kind so callers can
/// detect degradation without inspecting strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Generation {
    /// The answer text (degraded marker text when `failure` is set).
    pub text: String,
    /// Set when the answer is a degradation artifact, not a model answer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<GenerationFailure>,
}

impl Generation {
    /// A successful generation.
    pub fn ok(text: String) -> Self {
        Self { text, failure: None }
    }

    /// A degraded generation; the text carries the legacy failure marker.
    pub fn degraded(failure: GenerationFailure) -> Self {
        Self {
            text: format!("{GENERATION_FAILURE_MARKER} {failure}"),
            failure: Some(failure),
        }
    }

    /// Whether this answer is a degradation artifact.
    pub fn is_degraded(&self) -> bool {
        self.failure.is_some()
    }
}

/// Result bundle returned by a pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagOutcome {
    /// The question as asked.
    pub query: String,
    /// Ranked snippets the answer was grounded on.
    pub retrieval_results: Vec<RetrievalResult>,
    /// Generated answer with structured degradation state.
    pub answer: Generation,
    /// The concatenated context the prompt was built from.
    pub context: String,
    /// Set only when the service could not resolve the index at all.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Retrieval wall time in milliseconds.
    pub retrieval_ms: u64,
    /// Generation wall time in milliseconds.
    pub generation_ms: u64,
}

impl RagOutcome {
    /// Error bundle for a query whose index could not be resolved.
    pub fn resolution_error(query: &str, index_name: &str, detail: String) -> Self {
        Self {
            query: query.to_string(),
            retrieval_results: Vec::new(),
            answer: Generation {
                text: format!("unable to query index {index_name:?}"),
                failure: None,
            },
            context: String::new(),
            error: Some(detail),
            retrieval_ms: 0,
            generation_ms: 0,
        }
    }
}
