//! RAG service
//!
//! Owns the registry of named pipelines. Every index name maps to one
//! pipeline; unseen names are instantiated lazily under the base index
//! directory. The registry is a concurrent map so queries against
//! different indexes never contend, while per-pipeline read/write locks
//! serialize reconfiguration against in-flight queries.

use std::collections::BTreeSet;
use std::fs;
use std::sync::Arc;

use dashmap::DashMap;
use serde::Deserialize;
use tokio::sync::RwLock;

use crate::config::ServiceConfig;
use crate::error::Result;
use crate::generation::{GeneratorKind, GeneratorOptions};
use crate::pipeline::{PipelineConfig, RagPipeline};
use crate::query::{RagOutcome, RagQuery};
use crate::retrieval::RetrieverKind;

/// Name of the pre-registered index rooted at the base index directory.
pub const DEFAULT_INDEX: &str = "default";

/// Partial reconfiguration of one pipeline; unset fields stay as they are.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PipelineUpdate {
    pub retriever: Option<RetrieverKind>,
    pub generator: Option<GeneratorKind>,
    pub prompt_template: Option<String>,
    /// Construction options for generator switches. Ignored when switching
    /// to `qwen`, which always runs on the service credential.
    pub generator_options: Option<GeneratorOptions>,
}

impl PipelineUpdate {
    pub fn with_retriever(mut self, kind: RetrieverKind) -> Self {
        self.retriever = Some(kind);
        self
    }

    pub fn with_generator(mut self, kind: GeneratorKind) -> Self {
        self.generator = Some(kind);
        self
    }

    pub fn with_prompt_template(mut self, name: &str) -> Self {
        self.prompt_template = Some(name.to_string());
        self
    }

    pub fn with_generator_options(mut self, options: GeneratorOptions) -> Self {
        self.generator_options = Some(options);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.retriever.is_none() && self.generator.is_none() && self.prompt_template.is_none()
    }
}

/// Service facade over the pipeline registry.
pub struct RagService {
    config: ServiceConfig,
    pipelines: DashMap<String, Arc<RwLock<RagPipeline>>>,
}

impl RagService {
    /// Create the service and register the default pipeline.
    ///
    /// The `default` index is rooted at the base index directory itself,
    /// not at a `default` subdirectory.
    pub fn new(config: ServiceConfig) -> Result<Self> {
        let service = Self {
            pipelines: DashMap::new(),
            config,
        };

        let default_config = PipelineConfig::for_index(
            service.config.index_base_dir.clone(),
            &service.config,
        );
        let pipeline = RagPipeline::new(default_config)?;
        service
            .pipelines
            .insert(DEFAULT_INDEX.to_string(), Arc::new(RwLock::new(pipeline)));

        tracing::info!(
            index_base_dir = %service.config.index_base_dir.display(),
            "service ready, default pipeline registered"
        );
        Ok(service)
    }

    /// Get the pipeline for `index_name`, creating it on first use at
    /// `{index_base_dir}/{index_name}`.
    ///
    /// Concurrent first requests for the same name may each construct a
    /// pipeline, but insertion is atomic: exactly one wins and every caller
    /// gets the same shared handle. Losing constructions are dropped;
    /// construction side effects (template seeding) are idempotent.
    pub fn get_pipeline(&self, index_name: &str) -> Result<Arc<RwLock<RagPipeline>>> {
        if let Some(existing) = self.pipelines.get(index_name) {
            return Ok(existing.value().clone());
        }

        let index_dir = self.config.index_base_dir.join(index_name);
        tracing::info!(index = index_name, dir = %index_dir.display(), "creating pipeline");
        let pipeline = RagPipeline::new(PipelineConfig::for_index(index_dir, &self.config))?;
        let handle = Arc::new(RwLock::new(pipeline));

        let entry = self
            .pipelines
            .entry(index_name.to_string())
            .or_insert(handle);
        Ok(entry.value().clone())
    }

    /// Run one query against a named index.
    ///
    /// Never fails: a name that cannot be resolved to a pipeline produces
    /// an outcome bundle with the `error` field set and no results.
    pub async fn query(&self, index_name: &str, query: RagQuery) -> RagOutcome {
        match self.get_pipeline(index_name) {
            Ok(pipeline) => {
                let guard = pipeline.read().await;
                guard.run(&query).await
            }
            Err(e) => {
                tracing::error!(index = index_name, "failed to resolve index: {e}");
                RagOutcome::resolution_error(&query.query, index_name, e.to_string())
            }
        }
    }

    /// All known index names: `default` plus every subdirectory of the
    /// base index directory, deduplicated and sorted.
    pub fn list_indexes(&self) -> Vec<String> {
        let mut names = BTreeSet::new();
        names.insert(DEFAULT_INDEX.to_string());

        if let Ok(entries) = fs::read_dir(&self.config.index_base_dir) {
            for entry in entries.flatten() {
                if entry.path().is_dir() {
                    if let Some(name) = entry.file_name().to_str() {
                        names.insert(name.to_string());
                    }
                }
            }
        }
        names.into_iter().collect()
    }

    /// Apply a partial reconfiguration to one pipeline.
    ///
    /// Fields are applied in order (retriever, generator, template); an
    /// error leaves earlier fields applied. Switching the generator to
    /// `qwen` force-injects the service credential, model, and endpoint
    /// from [`ServiceConfig::llm`](crate::config::LlmSettings).
    pub async fn update_pipeline_config(
        &self,
        index_name: &str,
        update: PipelineUpdate,
    ) -> Result<()> {
        let pipeline = self.get_pipeline(index_name)?;
        let mut guard = pipeline.write().await;

        if let Some(kind) = update.retriever {
            guard.update_retriever(kind);
        }
        if let Some(kind) = update.generator {
            let options = if kind == GeneratorKind::Qwen {
                Some(GeneratorOptions {
                    api_key: self.config.llm.api_key.clone(),
                    model: Some(self.config.llm.model.clone()),
                    base_url: Some(self.config.llm.base_url.clone()),
                })
            } else {
                update.generator_options.clone()
            };
            guard.update_generator(kind, options)?;
        }
        if let Some(name) = &update.prompt_template {
            guard.update_prompt_template(name);
        }

        tracing::info!(index = index_name, "pipeline configuration updated");
        Ok(())
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }
}
