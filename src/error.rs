//! Error types for the RAG service
//!
//! Configuration and lookup problems fail fast with a descriptive variant;
//! retrieval data problems and generation transport problems are recovered
//! locally (degraded results / degraded answers) and never surface here.

/// Convenience alias used throughout the crate.
pub type Result<T, E = RagError> = std::result::Result<T, E>;

/// Errors surfaced by the public API.
#[derive(Debug, thiserror::Error)]
pub enum RagError {
    /// Retriever type name not one of `keyword`, `vector`, `hybrid`.
    #[error("unknown retriever type: {0:?}")]
    UnknownRetriever(String),

    /// Generator type name not one of `mock`, `openai`, `qwen`.
    #[error("unknown generator type: {0:?}")]
    UnknownGenerator(String),

    /// Embedding backend name not recognized.
    #[error("unknown embedding backend: {0:?}")]
    UnknownEmbeddingBackend(String),

    /// Remote generators cannot be constructed without a credential.
    #[error("generator {kind:?} requires an API key")]
    MissingApiKey { kind: &'static str },

    /// No template loaded under the requested name.
    #[error("prompt template not found: {name:?}")]
    TemplateNotFound { name: String },

    /// A `{placeholder}` in the template had no substitution supplied.
    #[error("template {name:?} references unsupplied placeholder {placeholder:?}")]
    MissingPlaceholder { name: String, placeholder: String },

    /// Template directory could not be created or scanned.
    #[error("template directory {dir:?} unusable: {source}")]
    TemplateDir {
        dir: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Writing a template through to disk failed; in-memory state unchanged.
    #[error("failed to persist template {name:?}: {source}")]
    TemplateWrite {
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// Settings could not be loaded or validated.
    #[error("configuration error: {0}")]
    Config(String),
}
