//! # ragdex
//!
//! A retrieval-augmented query service over local document indexes.
//!
//! ## Overview
//!
//! ragdex answers natural-language questions from pre-built document indexes
//! by combining:
//!
//! - Keyword, vector, and hybrid retrieval over CSV tables and JSON stores
//! - Prompt templating with disk-backed template files
//! - Answer generation via OpenAI-compatible chat APIs or a local mock
//! - A registry of per-index pipelines safe to share across async tasks
//!
//! ## Architecture
//!
//! The crate is organized into modular components:
//!
//! - `config` - Layered service configuration
//! - `query` - Query and outcome bundle types
//! - `retrieval` - Keyword, vector, and hybrid retrievers
//! - `generation` - Chat-based and mock answer generators
//! - `prompt` - Prompt template management
//! - `pipeline` - The retrieve, render, generate pipeline
//! - `service` - Named pipeline registry
//! - `cli` - Command-line interface

// Core modules
pub mod cli;
pub mod config;
pub mod error;
pub mod generation;
pub mod pipeline;
pub mod prompt;
pub mod query;
pub mod retrieval;
pub mod service;

// Re-export commonly used types
pub use config::ServiceConfig;
pub use error::{RagError, Result};
pub use generation::{Generator, GeneratorKind, GeneratorOptions};
pub use pipeline::{PipelineConfig, RagPipeline};
pub use prompt::PromptTemplateManager;
pub use query::{Generation, GenerationFailure, RagOutcome, RagQuery};
pub use retrieval::{RetrievalResult, Retriever, RetrieverKind};
pub use service::{PipelineUpdate, RagService, DEFAULT_INDEX};
