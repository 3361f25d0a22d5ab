//! Command-line interface
//!
//! Subcommand handlers for the ragdex binary; thin wrappers over
//! [`RagService`]. Each invocation builds a fresh service from the layered
//! configuration, so `configure` changes last for the process only (template
//! additions persist because the manager writes them through to disk).

use anyhow::{Context, Result};

use crate::config::ServiceConfig;
use crate::generation::GeneratorKind;
use crate::query::RagQuery;
use crate::retrieval::vector::EmbeddingBackendKind;
use crate::retrieval::RetrieverKind;
use crate::service::{PipelineUpdate, RagService};

fn build_service(api_key: Option<String>) -> Result<RagService> {
    let mut config = ServiceConfig::load().context("failed to load configuration")?;
    if let Some(key) = api_key {
        config.llm.api_key = Some(key);
    }
    RagService::new(config).context("failed to start service")
}

fn build_update(
    retriever: Option<RetrieverKind>,
    generator: Option<GeneratorKind>,
    template: Option<String>,
) -> PipelineUpdate {
    let mut update = PipelineUpdate::default();
    if let Some(kind) = retriever {
        update = update.with_retriever(kind);
    }
    if let Some(kind) = generator {
        update = update.with_generator(kind);
    }
    if let Some(name) = &template {
        update = update.with_prompt_template(name);
    }
    update
}

/// Execute the query command.
#[allow(clippy::too_many_arguments)]
pub async fn query(
    query_text: String,
    index: String,
    top_k: Option<u8>,
    retriever: Option<RetrieverKind>,
    generator: Option<GeneratorKind>,
    template: Option<String>,
    api_key: Option<String>,
    json: bool,
) -> Result<()> {
    let service = build_service(api_key)?;

    // Per-request overrides reconfigure the pipeline before the query runs.
    let update = build_update(retriever, generator, template);
    if !update.is_empty() {
        service
            .update_pipeline_config(&index, update)
            .await
            .with_context(|| format!("failed to reconfigure index {index:?}"))?;
    }

    let mut rag_query = RagQuery::new(&query_text);
    if let Some(top_k) = top_k {
        rag_query = rag_query.with_top_k(top_k as usize);
    }

    let outcome = service.query(&index, rag_query).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    println!("Answer:\n{}\n", outcome.answer.text);
    if let Some(failure) = &outcome.answer.failure {
        println!("(degraded: {failure})\n");
    }
    if let Some(error) = &outcome.error {
        println!("Error: {error}\n");
    }
    if !outcome.retrieval_results.is_empty() {
        println!("Sources:");
        for result in &outcome.retrieval_results {
            println!(
                "  [{:.3}] {}  {}",
                result.score,
                result.id,
                snippet(&result.content, 80)
            );
        }
        println!();
    }
    println!(
        "retrieval {} ms, generation {} ms",
        outcome.retrieval_ms, outcome.generation_ms
    );
    Ok(())
}

/// Execute the indexes command.
pub async fn indexes() -> Result<()> {
    let service = build_service(None)?;
    for name in service.list_indexes() {
        println!("{name}");
    }
    Ok(())
}

/// Execute the configure command.
pub async fn configure(
    index: String,
    retriever: Option<RetrieverKind>,
    generator: Option<GeneratorKind>,
    template: Option<String>,
    api_key: Option<String>,
) -> Result<()> {
    let service = build_service(api_key)?;

    let update = build_update(retriever, generator, template);
    if update.is_empty() {
        println!("nothing to update");
        return Ok(());
    }

    service
        .update_pipeline_config(&index, update)
        .await
        .with_context(|| format!("failed to reconfigure index {index:?}"))?;
    println!("pipeline configuration updated for index {index:?}");
    Ok(())
}

/// Execute the types command.
pub fn types() -> Result<()> {
    println!("retrievers: {}", RetrieverKind::NAMES.join(", "));
    println!("generators: {}", GeneratorKind::NAMES.join(", "));
    println!("embedding backends: {}", EmbeddingBackendKind::NAMES.join(", "));
    Ok(())
}

/// Execute the templates command.
pub async fn templates(index: String) -> Result<()> {
    let service = build_service(None)?;
    let pipeline = service
        .get_pipeline(&index)
        .with_context(|| format!("failed to resolve index {index:?}"))?;

    let guard = pipeline.read().await;
    for name in guard.templates().list() {
        println!("{name}");
    }
    Ok(())
}

/// Truncate `text` to `max_chars`, marking the cut with an ellipsis.
fn snippet(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max_chars).collect();
        format!("{cut}...")
    }
}
