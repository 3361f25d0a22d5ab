//! RAG pipeline orchestration
//!
//! Coordinates retrieval, context assembly, prompt rendering, and answer
//! generation for one index. A run never fails: retrieval degrades to
//! fewer results, a broken template falls back to an inline prompt, and
//! generation failures come back as degraded answers.

use std::path::PathBuf;
use std::time::Instant;

use crate::config::ServiceConfig;
use crate::error::Result;
use crate::generation::{Generator, GeneratorKind, GeneratorOptions};
use crate::prompt::{PromptTemplateManager, DEFAULT_TEMPLATE};
use crate::query::{RagOutcome, RagQuery};
use crate::retrieval::{EmbeddingSettings, Retriever, RetrieverConfig, RetrieverKind};

/// Configuration for one pipeline instance.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Directory the index artifacts live under.
    pub index_dir: PathBuf,
    /// Retrieval strategy.
    pub retriever: RetrieverKind,
    /// Answer generator.
    pub generator: GeneratorKind,
    /// Prompt template file name.
    pub prompt_template: String,
    /// Generator construction overrides (credential, model, endpoint).
    pub generator_options: GeneratorOptions,
    /// Directory of prompt templates, shared across pipelines.
    pub template_dir: PathBuf,
    /// Embedding seam for the vector strategy.
    pub embedding: EmbeddingSettings,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            index_dir: PathBuf::from("./output"),
            retriever: RetrieverKind::default(),
            generator: GeneratorKind::default(),
            prompt_template: DEFAULT_TEMPLATE.to_string(),
            generator_options: GeneratorOptions::default(),
            template_dir: PathBuf::from("./templates"),
            embedding: EmbeddingSettings::default(),
        }
    }
}

impl PipelineConfig {
    /// Defaults for an index rooted at `index_dir`, with template location,
    /// default template, and embedding settings taken from the service
    /// configuration.
    pub fn for_index(index_dir: impl Into<PathBuf>, service: &ServiceConfig) -> Self {
        Self {
            index_dir: index_dir.into(),
            prompt_template: service.prompt.default_template.clone(),
            template_dir: service.prompt.template_dir.clone(),
            embedding: service.embedding.clone(),
            ..Self::default()
        }
    }

    /// Set the index directory.
    pub fn with_index_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.index_dir = dir.into();
        self
    }

    /// Set the retrieval strategy.
    pub fn with_retriever(mut self, kind: RetrieverKind) -> Self {
        self.retriever = kind;
        self
    }

    /// Set the generator.
    pub fn with_generator(mut self, kind: GeneratorKind) -> Self {
        self.generator = kind;
        self
    }

    /// Set the prompt template name.
    pub fn with_prompt_template(mut self, name: &str) -> Self {
        self.prompt_template = name.to_string();
        self
    }

    /// Set the generator construction options.
    pub fn with_generator_options(mut self, options: GeneratorOptions) -> Self {
        self.generator_options = options;
        self
    }

    /// Set the template directory.
    pub fn with_template_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.template_dir = dir.into();
        self
    }

    /// Set the embedding settings.
    pub fn with_embedding(mut self, embedding: EmbeddingSettings) -> Self {
        self.embedding = embedding;
        self
    }

    fn retriever_config(&self) -> RetrieverConfig {
        RetrieverConfig {
            index_dir: self.index_dir.clone(),
            embedding: self.embedding.clone(),
        }
    }
}

/// RAG pipeline for one index.
///
/// Orchestrates the full workflow:
/// 1. Retrieve relevant snippets
/// 2. Join them into a context block
/// 3. Render the prompt template
/// 4. Generate the answer
#[derive(Debug)]
pub struct RagPipeline {
    config: PipelineConfig,
    retriever: Retriever,
    generator: Generator,
    templates: PromptTemplateManager,
}

impl RagPipeline {
    /// Build a pipeline from `config`.
    ///
    /// Fails fast on an unusable template directory or a misconfigured
    /// generator; index data problems only degrade retrieval.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        let templates = PromptTemplateManager::new(&config.template_dir)?;
        let retriever = Retriever::create(config.retriever, &config.retriever_config());
        let generator = Generator::create(config.generator, &config.generator_options)?;

        tracing::info!(
            index_dir = %config.index_dir.display(),
            retriever = %config.retriever,
            generator = %config.generator,
            template = %config.prompt_template,
            "pipeline ready"
        );
        Ok(Self {
            config,
            retriever,
            generator,
            templates,
        })
    }

    /// Execute one query end to end.
    ///
    /// Always produces a full outcome bundle; degradation is visible in the
    /// answer's failure field, never as an error.
    pub async fn run(&self, query: &RagQuery) -> RagOutcome {
        let retrieval_start = Instant::now();
        let retrieval_results = self.retriever.retrieve(&query.query, query.top_k);
        let retrieval_ms = retrieval_start.elapsed().as_millis() as u64;

        let context = retrieval_results
            .iter()
            .map(|result| result.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");

        let prompt = match self.templates.render(
            &self.config.prompt_template,
            &[("context", &context), ("question", &query.query)],
        ) {
            Ok(prompt) => prompt,
            Err(e) => {
                tracing::warn!(
                    template = %self.config.prompt_template,
                    "template render failed, falling back to inline prompt: {e}"
                );
                fallback_prompt(&context, &query.query)
            }
        };

        let generation_start = Instant::now();
        let answer = self.generator.generate(&prompt, &query.params).await;
        let generation_ms = generation_start.elapsed().as_millis() as u64;

        tracing::debug!(
            results = retrieval_results.len(),
            retrieval_ms,
            generation_ms,
            degraded = answer.is_degraded(),
            "query complete"
        );

        RagOutcome {
            query: query.query.clone(),
            retrieval_results,
            answer,
            context,
            error: None,
            retrieval_ms,
            generation_ms,
        }
    }

    /// Switch the retrieval strategy, rebuilding it over the same index.
    pub fn update_retriever(&mut self, kind: RetrieverKind) {
        self.config.retriever = kind;
        self.retriever = Retriever::create(kind, &self.config.retriever_config());
        tracing::info!(retriever = %kind, "retriever updated");
    }

    /// Switch the generator; `options`, when given, replaces the stored
    /// construction options. On error the previous generator stays active.
    pub fn update_generator(
        &mut self,
        kind: GeneratorKind,
        options: Option<GeneratorOptions>,
    ) -> Result<()> {
        let options = options.unwrap_or_else(|| self.config.generator_options.clone());
        let generator = Generator::create(kind, &options)?;

        self.generator = generator;
        self.config.generator = kind;
        self.config.generator_options = options;
        tracing::info!(generator = %kind, "generator updated");
        Ok(())
    }

    /// Point subsequent runs at a different prompt template.
    ///
    /// The name is not validated against loaded templates; a run with an
    /// unknown template uses the inline fallback prompt.
    pub fn update_prompt_template(&mut self, name: &str) {
        if !self.templates.contains(name) {
            tracing::warn!(
                template = name,
                "template not loaded, runs will use the inline fallback prompt"
            );
        }
        self.config.prompt_template = name.to_string();
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    pub fn generator(&self) -> &Generator {
        &self.generator
    }

    pub fn retriever_kind(&self) -> RetrieverKind {
        self.retriever.kind()
    }

    pub fn generator_kind(&self) -> GeneratorKind {
        self.generator.kind()
    }

    pub fn prompt_template(&self) -> &str {
        &self.config.prompt_template
    }

    /// Template manager shared by this pipeline's runs.
    pub fn templates(&self) -> &PromptTemplateManager {
        &self.templates
    }

    /// Mutable template manager, for adding templates at runtime.
    pub fn templates_mut(&mut self) -> &mut PromptTemplateManager {
        &mut self.templates
    }
}

/// Inline prompt used when the configured template cannot be rendered.
fn fallback_prompt(context: &str, question: &str) -> String {
    format!(
        "Answer the question based on the following context:\n\n{context}\n\nQuestion: {question}\n\nAnswer:"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::MOCK_ECHO_PREFIX;
    use std::fs;
    use tempfile::tempdir;

    fn test_config(root: &std::path::Path) -> PipelineConfig {
        PipelineConfig::default()
            .with_index_dir(root.join("index"))
            .with_template_dir(root.join("templates"))
    }

    fn write_index(root: &std::path::Path, docs: &[(&str, &str)]) {
        let index_dir = root.join("index");
        fs::create_dir_all(&index_dir).unwrap();
        let body: serde_json::Value = docs
            .iter()
            .map(|(id, content)| {
                (id.to_string(), serde_json::json!({ "content": content }))
            })
            .collect::<serde_json::Map<String, serde_json::Value>>()
            .into();
        fs::write(index_dir.join("keyword_index.json"), body.to_string()).unwrap();
    }

    #[tokio::test]
    async fn test_run_produces_full_bundle() {
        let root = tempdir().unwrap();
        write_index(
            root.path(),
            &[("doc_0", "rust compiles to native code"), ("doc_1", "unrelated gardening notes")],
        );
        let pipeline = RagPipeline::new(
            test_config(root.path()).with_retriever(RetrieverKind::Keyword),
        )
        .unwrap();

        let outcome = pipeline
            .run(&RagQuery::new("how does rust compile?"))
            .await;

        assert_eq!(outcome.query, "how does rust compile?");
        assert_eq!(outcome.retrieval_results.len(), 1);
        assert_eq!(outcome.context, "rust compiles to native code");
        assert!(outcome.error.is_none());
        assert!(!outcome.answer.is_degraded());
        assert!(outcome.answer.text.starts_with(MOCK_ECHO_PREFIX));
        // The mock echoes the rendered template, which opens with the
        // default system prompt.
        assert!(outcome.answer.text.contains("You are a knowledge-base assistant"));
    }

    #[tokio::test]
    async fn test_context_joins_results_with_blank_line() {
        let root = tempdir().unwrap();
        write_index(
            root.path(),
            &[("doc_0", "alpha shared"), ("doc_1", "beta shared")],
        );
        let pipeline = RagPipeline::new(
            test_config(root.path()).with_retriever(RetrieverKind::Keyword),
        )
        .unwrap();

        let outcome = pipeline.run(&RagQuery::new("shared")).await;

        assert_eq!(outcome.context, "alpha shared\n\nbeta shared");
    }

    #[tokio::test]
    async fn test_empty_index_still_answers() {
        let root = tempdir().unwrap();
        let pipeline = RagPipeline::new(
            test_config(root.path()).with_retriever(RetrieverKind::Keyword),
        )
        .unwrap();

        let outcome = pipeline.run(&RagQuery::new("anything")).await;

        assert!(outcome.retrieval_results.is_empty());
        assert_eq!(outcome.context, "");
        assert!(!outcome.answer.is_degraded());
    }

    #[tokio::test]
    async fn test_unknown_template_uses_fallback_prompt() {
        let root = tempdir().unwrap();
        write_index(root.path(), &[("doc_0", "some facts")]);
        let pipeline = RagPipeline::new(
            test_config(root.path())
                .with_retriever(RetrieverKind::Keyword)
                .with_prompt_template("missing.txt"),
        )
        .unwrap();

        let outcome = pipeline.run(&RagQuery::new("facts")).await;

        assert!(outcome.answer.text.starts_with(&format!(
            "{MOCK_ECHO_PREFIX}Answer the question based on the following context"
        )));
    }

    #[tokio::test]
    async fn test_template_added_at_runtime_is_rendered() {
        let root = tempdir().unwrap();
        write_index(root.path(), &[("doc_0", "fusion facts")]);
        let mut pipeline = RagPipeline::new(
            test_config(root.path()).with_retriever(RetrieverKind::Keyword),
        )
        .unwrap();

        pipeline
            .templates_mut()
            .add("terse.txt", "Q: {question}\nC: {context}\n")
            .unwrap();
        pipeline.update_prompt_template("terse.txt");

        let outcome = pipeline.run(&RagQuery::new("fusion")).await;

        assert_eq!(pipeline.prompt_template(), "terse.txt");
        assert!(outcome
            .answer
            .text
            .starts_with(&format!("{MOCK_ECHO_PREFIX}Q: fusion")));
    }

    #[tokio::test]
    async fn test_default_hybrid_over_empty_dir_serves_placeholders() {
        let root = tempdir().unwrap();
        let pipeline = RagPipeline::new(test_config(root.path())).unwrap();

        let outcome = pipeline.run(&RagQuery::new("q").with_top_k(3)).await;

        // No keyword index, so fusion passes through the vector
        // placeholders, re-scored by the vector weight.
        assert_eq!(outcome.retrieval_results.len(), 3);
        assert!((outcome.retrieval_results[0].score - 0.8 * 0.7).abs() < 1e-6);
        assert!(outcome.retrieval_results[0].source_id.is_some());
    }

    #[test]
    fn test_update_retriever_rebuilds() {
        let root = tempdir().unwrap();
        let mut pipeline = RagPipeline::new(test_config(root.path())).unwrap();
        assert_eq!(pipeline.retriever_kind(), RetrieverKind::Hybrid);

        pipeline.update_retriever(RetrieverKind::Vector);

        assert_eq!(pipeline.retriever_kind(), RetrieverKind::Vector);
        assert_eq!(pipeline.config().retriever, RetrieverKind::Vector);
    }

    #[test]
    fn test_update_generator_keeps_old_on_error() {
        let root = tempdir().unwrap();
        let mut pipeline = RagPipeline::new(test_config(root.path())).unwrap();

        let err = pipeline.update_generator(GeneratorKind::OpenAi, None);

        assert!(err.is_err());
        assert_eq!(pipeline.generator_kind(), GeneratorKind::Mock);
        assert_eq!(pipeline.config().generator, GeneratorKind::Mock);
    }

    #[test]
    fn test_update_generator_with_options() {
        let root = tempdir().unwrap();
        let mut pipeline = RagPipeline::new(test_config(root.path())).unwrap();

        pipeline
            .update_generator(
                GeneratorKind::Qwen,
                Some(GeneratorOptions::default().with_api_key("sk-test")),
            )
            .unwrap();

        assert_eq!(pipeline.generator_kind(), GeneratorKind::Qwen);
    }

    #[test]
    fn test_update_prompt_template_accepts_unknown_name() {
        let root = tempdir().unwrap();
        let mut pipeline = RagPipeline::new(test_config(root.path())).unwrap();

        pipeline.update_prompt_template("not_there_yet.txt");

        assert_eq!(pipeline.prompt_template(), "not_there_yet.txt");
    }
}
