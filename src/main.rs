//! # kbx CLI
//!
//! The `kbx` binary is the primary interface for the knowledge-base
//! pipeline. It provides commands for registry initialization, document
//! ingestion, question answering, inspection, and the HTTP server.
//!
//! ## Usage
//!
//! ```bash
//! kbx --config ./config/kbx.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `kbx init` | Create the namespace registry database |
//! | `kbx ingest` | Chunk, embed, and upsert the document directory |
//! | `kbx ask "<question>"` | Answer a question from the knowledge base |
//! | `kbx stats` | Show registry and store vector counts |
//! | `kbx clear` | Wipe the configured namespace and forget it |
//! | `kbx serve` | Start the HTTP API server |
//!
//! ## Examples
//!
//! ```bash
//! # Initialize the registry
//! kbx init --config ./config/kbx.toml
//!
//! # See what would be ingested without touching any backend
//! kbx ingest --dry-run
//!
//! # Ingest the whole document directory
//! kbx ingest
//!
//! # Re-ingest a single updated file
//! kbx ingest --file ./documents/dept.json
//!
//! # Ask a question
//! kbx ask "Who chairs the department?"
//!
//! # Start the HTTP server
//! kbx serve
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use kbx::{answer, config, ingest, registry, server, stats};

/// kbx — a JSON knowledge-base ingestion and question-answering pipeline.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/kbx.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "kbx",
    about = "kbx — a JSON knowledge-base ingestion and question-answering pipeline",
    version,
    long_about = "kbx ingests a directory of JSON documents into a namespaced vector store \
    (normalizing, chunking, and embedding them with stable chunk identities), and answers \
    questions against the stored chunks via retrieval-grounded generation, exposed through \
    a CLI and a JSON HTTP server."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/kbx.toml`. All document, store, embedding,
    /// and server settings are read from this file.
    #[arg(long, global = true, default_value = "./config/kbx.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the namespace registry database.
    ///
    /// Creates the SQLite file and its tables. Idempotent — running it
    /// multiple times is safe.
    Init,

    /// Ingest JSON documents into the vector store.
    ///
    /// Discovers documents in the configured directory, normalizes and
    /// chunks them, embeds the chunks, and upserts them under stable ids.
    /// Re-ingesting a document supersedes its previously stored chunks.
    Ingest {
        /// Ingest a single file instead of the whole directory.
        #[arg(long)]
        file: Option<PathBuf>,

        /// Show document and chunk counts without embedding or writing.
        #[arg(long)]
        dry_run: bool,
    },

    /// Answer a question from the knowledge base.
    ///
    /// Embeds the question, retrieves the most relevant chunks, and
    /// generates a grounded answer. Answers "I don't know." when nothing
    /// relevant is stored.
    Ask {
        /// The question to answer.
        question: String,
    },

    /// Show registry contents and store vector counts.
    Stats,

    /// Wipe the configured namespace in the store and the registry.
    ///
    /// Required before changing the chunking policy, which would
    /// otherwise strand every previously written chunk id.
    Clear,

    /// Start the HTTP API server.
    ///
    /// Serves `POST /answer`, `POST /ingest`, and `GET /health` on the
    /// address configured in `[server].bind`.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("kbx=info")),
        )
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let reg = registry::NamespaceRegistry::connect(&cfg.registry.path).await?;
            reg.close().await;
            println!("Registry initialized at {}", cfg.registry.path.display());
        }
        Commands::Ingest { file, dry_run } => {
            ingest::run_ingest(&cfg, file.as_deref(), dry_run).await?;
        }
        Commands::Ask { question } => {
            answer::run_ask(&cfg, &question).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
        Commands::Clear => {
            ingest::run_clear(&cfg).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
