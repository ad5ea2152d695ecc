//! # doc-answer CLI (`dqa`)
//!
//! The `dqa` binary drives the full pipeline: index construction from the
//! uploads directory, one-shot question answering, artifact inspection, and
//! the HTTP service.
//!
//! ## Usage
//!
//! ```bash
//! dqa --config ./config/dqa.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `dqa ingest` | Extract, chunk, embed, and persist the passage index |
//! | `dqa ask "<question>"` | Answer one question (grounded when an index exists) |
//! | `dqa status` | Show the persisted index artifacts |
//! | `dqa serve` | Start the HTTP question-answering service |
//!
//! ## Examples
//!
//! ```bash
//! # Build the index from ./data/uploads
//! dqa ingest --config ./config/dqa.toml
//!
//! # Grounded question against the indexed documents
//! dqa ask "Is knee surgery covered?" --top-k 5
//!
//! # General-knowledge answer, skipping retrieval
//! dqa ask "What is a waiting period?" --general
//!
//! # Start the JSON API
//! dqa serve --config ./config/dqa.toml
//! ```

mod answer;
mod ask;
mod chunk;
mod config;
mod embedding;
mod extract;
mod ingest;
mod retrieve;
mod server;
mod status;
mod store;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// doc-answer CLI — retrieval-augmented question answering over uploaded
/// documents.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/dqa.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "dqa",
    about = "doc-answer — retrieval-augmented question answering over uploaded documents",
    version,
    long_about = "doc-answer ingests uploaded documents (PDF, DOCX, EML) into a passage index \
    and answers natural-language questions against it, retrieving the most relevant passages \
    and grounding an external chat model on them, with a general-knowledge fallback."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/dqa.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Build the passage index from the uploads directory.
    ///
    /// Extracts text from every supported document, chunks it into passages,
    /// embeds them, and persists the index. The previous index is replaced
    /// in full. Documents that fail extraction are skipped with a warning.
    Ingest,

    /// Answer a single question.
    ///
    /// Retrieves the most relevant passages from the index and asks the
    /// configured chat model for a grounded answer. Falls back to general
    /// knowledge when the document does not cover the question.
    Ask {
        /// The question to answer.
        question: String,

        /// Number of passages to retrieve (defaults to `retrieval.top_k`).
        #[arg(long)]
        top_k: Option<usize>,

        /// Skip retrieval and answer from general knowledge.
        #[arg(long)]
        general: bool,

        /// Print the full structured result as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show the persisted index artifacts.
    Status,

    /// Start the HTTP question-answering service.
    ///
    /// Binds to `[server].bind` and serves `/health`, `/run`, and `/query`.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Ingest => {
            // Extraction and embedding are CPU-bound; keep them off the
            // async runtime's core threads.
            let cfg = cfg.clone();
            tokio::task::spawn_blocking(move || {
                let embedder = embedding::create_embedder(&cfg.embedding)?;
                ingest::run_ingest(&cfg, embedder).map(|_| ())
            })
            .await??;
        }
        Commands::Ask {
            question,
            top_k,
            general,
            json,
        } => {
            ask::run_ask(&cfg, &question, top_k, general, json).await?;
        }
        Commands::Status => {
            status::run_status(&cfg)?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
