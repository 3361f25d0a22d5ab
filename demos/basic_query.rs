//! Basic query example
//!
//! This demonstrates the core query workflow:
//! - Building a small keyword index on disk
//! - Starting a pipeline registry over the index directory
//! - Running a question through retrieve, render, and generate
//! - Reading the outcome bundle
//!
//! Usage:
//!   cargo run --example basic_query

use anyhow::Result;
use ragdex::{RagQuery, RagService, ServiceConfig, DEFAULT_INDEX};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing for logging
    tracing_subscriber::fmt().with_env_filter("info").init();

    println!("=== ragdex basic query example ===\n");

    // Step 1: Write a small keyword index to a scratch directory
    println!("Step 1: Building a sample index...");
    let scratch = tempfile::tempdir()?;
    let index_dir = scratch.path();
    std::fs::write(
        index_dir.join("keyword_index.json"),
        serde_json::json!({
            "doc_0": {
                "content": "Rust guarantees memory safety without a garbage collector.",
                "metadata": {"source": "rust-notes"}
            },
            "doc_1": {
                "content": "The borrow checker enforces aliasing rules at compile time.",
                "metadata": {"source": "rust-notes"}
            },
            "doc_2": {
                "content": "Tokio schedules asynchronous tasks on a work-stealing runtime.",
                "metadata": {"source": "async-notes"}
            }
        })
        .to_string(),
    )?;
    println!("  Index directory: {}\n", index_dir.display());

    // Step 2: Start the service over that directory
    println!("Step 2: Starting the service...");
    let config = ServiceConfig::default()
        .with_index_base_dir(index_dir)
        .with_template_dir(index_dir.join("templates"));
    let service = RagService::new(config)?;
    println!("  Known indexes: {:?}\n", service.list_indexes());

    // Step 3: Ask a question (the default pipeline uses the mock generator)
    println!("Step 3: Querying...");
    let question = "How does Rust guarantee memory safety?";
    let outcome = service
        .query(DEFAULT_INDEX, RagQuery::new(question).with_top_k(2))
        .await;

    // Step 4: Inspect the outcome bundle
    println!("Step 4: Results\n");
    println!("Question: {}", outcome.query);
    println!("Answer:   {}\n", outcome.answer.text);
    println!("Retrieved {} document(s):", outcome.retrieval_results.len());
    for result in &outcome.retrieval_results {
        println!("  [{:.3}] {}: {}", result.score, result.id, result.content);
    }
    println!(
        "\nTimings: retrieval {} ms, generation {} ms",
        outcome.retrieval_ms, outcome.generation_ms
    );

    Ok(())
}
