use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ragdex::cli;
use ragdex::config::MAX_TOP_K;
use ragdex::generation::GeneratorKind;
use ragdex::retrieval::RetrieverKind;

#[derive(Parser)]
#[command(name = "ragdex")]
#[command(about = "Retrieval-augmented query service over local document indexes", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer a question from a named index
    Query {
        /// Question text
        query: String,

        /// Index to query
        #[arg(short, long, default_value = "default")]
        index: String,

        /// Number of documents to retrieve
        #[arg(short = 'k', long, value_parser = clap::value_parser!(u8).range(1..=MAX_TOP_K as i64))]
        top_k: Option<u8>,

        /// Retriever type: keyword, vector, or hybrid
        #[arg(short, long)]
        retriever: Option<RetrieverKind>,

        /// Generator type: mock, openai, or qwen
        #[arg(short, long)]
        generator: Option<GeneratorKind>,

        /// Prompt template file name
        #[arg(long)]
        template: Option<String>,

        /// API key for remote generators (overrides configuration)
        #[arg(long)]
        api_key: Option<String>,

        /// Print the full outcome bundle as JSON
        #[arg(long)]
        json: bool,
    },

    /// List known indexes
    Indexes,

    /// Update the retriever, generator, or prompt template of an index
    Configure {
        /// Index to reconfigure
        #[arg(short, long, default_value = "default")]
        index: String,

        /// Retriever type: keyword, vector, or hybrid
        #[arg(short, long)]
        retriever: Option<RetrieverKind>,

        /// Generator type: mock, openai, or qwen
        #[arg(short, long)]
        generator: Option<GeneratorKind>,

        /// Prompt template file name
        #[arg(long)]
        template: Option<String>,

        /// API key for remote generators (overrides configuration)
        #[arg(long)]
        api_key: Option<String>,
    },

    /// List available retriever, generator, and embedding backend types
    Types,

    /// List the prompt templates loaded for an index
    Templates {
        /// Index whose templates to list
        #[arg(short, long, default_value = "default")]
        index: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing subscriber for logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ragdex=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Query {
            query,
            index,
            top_k,
            retriever,
            generator,
            template,
            api_key,
            json,
        } => {
            cli::query(
                query, index, top_k, retriever, generator, template, api_key, json,
            )
            .await?;
        }

        Commands::Indexes => {
            cli::indexes().await?;
        }

        Commands::Configure {
            index,
            retriever,
            generator,
            template,
            api_key,
        } => {
            cli::configure(index, retriever, generator, template, api_key).await?;
        }

        Commands::Types => {
            cli::types()?;
        }

        Commands::Templates { index } => {
            cli::templates(index).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_top_k_accepts_only_the_valid_range() {
        assert!(Cli::try_parse_from(["ragdex", "query", "q", "-k", "0"]).is_err());
        assert!(Cli::try_parse_from(["ragdex", "query", "q", "-k", "21"]).is_err());

        let cli = Cli::try_parse_from(["ragdex", "query", "q", "-k", "20"]).unwrap();
        match cli.command {
            Commands::Query { top_k, .. } => assert_eq!(top_k, Some(20)),
            _ => panic!("expected the query subcommand"),
        }
    }

    #[test]
    fn test_query_flags_parse() {
        let cli = Cli::try_parse_from([
            "ragdex",
            "query",
            "what is fusion?",
            "--index",
            "papers",
            "--retriever",
            "keyword",
            "--generator",
            "mock",
            "--json",
        ])
        .unwrap();

        match cli.command {
            Commands::Query {
                query,
                index,
                top_k,
                retriever,
                generator,
                json,
                ..
            } => {
                assert_eq!(query, "what is fusion?");
                assert_eq!(index, "papers");
                assert_eq!(top_k, None);
                assert_eq!(retriever, Some(RetrieverKind::Keyword));
                assert_eq!(generator, Some(GeneratorKind::Mock));
                assert!(json);
            }
            _ => panic!("expected the query subcommand"),
        }
    }
}
