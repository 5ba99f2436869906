//! # ragline CLI
//!
//! Index documents into a local vector store and ask questions over them.
//!
//! ## Usage
//!
//! ```bash
//! ragline --config ./config/ragline.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `ragline index --source <path>` | Index a file or directory |
//! | `ragline index-urls --urls <url>...` | Fetch and index web pages |
//! | `ragline query "<question>"` | Answer a question (add `--citations` for references) |
//! | `ragline clear` | Delete the persisted collection |
//! | `ragline status` | Show the store state |
//! | `ragline serve` | Start the HTTP API |
//! | `ragline completions <shell>` | Print shell completions |
//!
//! ## Examples
//!
//! ```bash
//! ragline index --source ./docs --recursive
//! ragline query "How do I rotate the signing key?" --filter source=docs/keys.md
//! ragline query "What changed in 2.0?" --citations
//! ```

use anyhow::Context;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use serde_json::Value;
use std::path::PathBuf;

use ragline::config::{self, Config};
use ragline::logging::init_tracing;
use ragline::pipeline::RagPipeline;
use ragline::server;
use ragline::vector_store::StoreStatus;
use ragline_core::citation::format_references;
use ragline_core::store::MetadataFilter;

/// ragline: citation-aware retrieval-augmented question answering.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/ragline.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "ragline",
    about = "Citation-aware retrieval-augmented question answering over local documents and web pages",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/ragline.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Index a file or a directory of `.txt`, `.md`, `.pdf`, `.docx`, `.html` files.
    ///
    /// Creates the collection on first use and appends afterwards.
    Index {
        /// File or directory to index.
        #[arg(long)]
        source: PathBuf,

        /// Descend into subdirectories.
        #[arg(long)]
        recursive: bool,
    },

    /// Fetch web pages and index their text.
    IndexUrls {
        #[arg(long, num_args = 1.., required = true)]
        urls: Vec<String>,
    },

    /// Ask a question over the indexed documents.
    Query {
        question: String,

        /// Restrict retrieval to chunks whose metadata matches `key=value`.
        /// Repeatable; every pair must match. Values are read as JSON when
        /// they parse (`page=2`), otherwise as strings.
        #[arg(long = "filter", value_parser = parse_filter)]
        filters: Vec<(String, Value)>,

        /// Answer with inline `[n]` citations and print the references.
        #[arg(long)]
        citations: bool,
    },

    /// Delete the persisted collection.
    Clear,

    /// Show whether a collection exists, with its model and size.
    Status,

    /// Start the HTTP API on `[server].bind`.
    Serve,

    /// Print a shell completion script to stdout.
    Completions { shell: Shell },
}

/// Parse a `key=value` pair for `--filter` arguments.
fn parse_filter(s: &str) -> Result<(String, Value), String> {
    let pos = s
        .find('=')
        .ok_or_else(|| format!("invalid KEY=VALUE: no '=' found in '{}'", s))?;
    Ok((s[..pos].to_string(), filter_value(&s[pos + 1..])))
}

/// `3` and `true` match numeric and boolean metadata; `"3"` forces a string.
fn filter_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Commands that don't require config
    if let Commands::Completions { shell } = &cli.command {
        clap_complete::generate(*shell, &mut Cli::command(), "ragline", &mut std::io::stdout());
        return Ok(());
    }

    let cfg = config::load_config(&cli.config)?;
    let _log_guard = init_tracing(&cfg.logging)?;

    if let Commands::Serve = cli.command {
        return server::run_server(&cfg).await;
    }

    let pipeline = RagPipeline::from_config(&cfg).context("Failed to initialize pipeline")?;
    run_command(&pipeline, &cfg, cli.command).await
}

async fn run_command(pipeline: &RagPipeline, cfg: &Config, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Index { source, recursive } => {
            let report = pipeline
                .index(&source, recursive)
                .await
                .with_context(|| format!("Failed to index {}", source.display()))?;
            for failure in &report.failures {
                eprintln!("skipped {}", failure);
            }
            println!("Indexed {} documents", report.chunks);
        }
        Commands::IndexUrls { urls } => {
            let report = pipeline
                .index_from_urls(&urls)
                .await
                .context("Failed to index URLs")?;
            for failure in &report.failures {
                eprintln!("skipped {}", failure);
            }
            println!("Indexed {} documents from URLs", report.chunks);
        }
        Commands::Query {
            question,
            filters,
            citations,
        } => {
            let filter: MetadataFilter = filters.into_iter().collect();
            let filter = (!filter.is_empty()).then_some(&filter);

            println!("\nQuestion: {}", question);
            if citations {
                let answer = pipeline
                    .query_with_citations(&question, filter)
                    .await
                    .context("Query failed")?;
                println!("\nAnswer: {}", answer.answer);
                if !answer.references.is_empty() {
                    println!("\nReferences:\n{}", format_references(&answer.references));
                }
            } else {
                let answer = pipeline.query(&question, filter).await.context("Query failed")?;
                println!("\nAnswer: {}", answer);
            }
        }
        Commands::Clear => {
            pipeline.clear().await.context("Failed to clear index")?;
            println!("Index cleared successfully");
        }
        Commands::Status => match pipeline.status().await? {
            StoreStatus::Uninitialized => {
                println!("store:  {} (empty)", cfg.store.path.display());
            }
            StoreStatus::Active {
                model,
                dims,
                location,
                chunks,
            } => {
                println!("store:  {}", location);
                println!("model:  {} ({} dims)", model, dims);
                println!("chunks: {}", chunks);
            }
        },
        Commands::Serve | Commands::Completions { .. } => {
            // Handled in main before the pipeline is built
            unreachable!()
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn filter_values_keep_their_json_type() {
        assert_eq!(parse_filter("chunk_id=3").unwrap(), ("chunk_id".to_string(), json!(3)));
        assert_eq!(parse_filter("page=2").unwrap().1, json!(2));
        assert_eq!(parse_filter("draft=true").unwrap().1, json!(true));
    }

    #[test]
    fn filter_values_fall_back_to_strings() {
        assert_eq!(
            parse_filter("source=docs/keys.md").unwrap(),
            ("source".to_string(), json!("docs/keys.md"))
        );
        assert_eq!(parse_filter("page=\"2\"").unwrap().1, json!("2"));
        assert_eq!(parse_filter("title=").unwrap().1, json!(""));
        assert_eq!(parse_filter("url=a=b").unwrap().1, json!("a=b"));
    }

    #[test]
    fn filter_without_equals_is_rejected() {
        assert!(parse_filter("source").is_err());
    }

    #[test]
    fn numeric_filter_matches_enriched_metadata() {
        let cli = Cli::try_parse_from(["ragline", "query", "q", "--filter", "chunk_id=0"]).unwrap();
        let Commands::Query { filters, .. } = cli.command else {
            panic!("expected query command");
        };
        let filter: MetadataFilter = filters.into_iter().collect();
        let metadata = ragline_core::models::ChunkMetadata {
            source: "a.txt".to_string(),
            title: "a.txt".to_string(),
            created_at: "2024-01-01T00:00:00+00:00".to_string(),
            doc_id: 0,
            chunk_id: 0,
            extra: serde_json::Map::new(),
        };
        assert!(filter.matches(&metadata));
    }
}
