//! # rag-docs CLI (`ragdocs`)
//!
//! Indexes a local documents folder into a vector store and answers
//! retrieval queries against it, either from the command line or through
//! the HTTP tool server.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `ragdocs build` | Index the documents directory (incremental) |
//! | `ragdocs build --rebuild` | Index from scratch |
//! | `ragdocs refresh` | Rebuild with the resolved configuration |
//! | `ragdocs query "<text>"` | Most relevant documents for a query |
//! | `ragdocs status` | Document and chunk counts |
//! | `ragdocs serve` | Start the HTTP tool server |
//!
//! ## Examples
//!
//! ```bash
//! ragdocs build --docs-dir ./docs --data-dir ./data
//! ragdocs query "how do I rotate keys" --top-k 5
//! RAGDOCS_EMBEDDING_BACKEND=simple ragdocs status
//! ragdocs --config ./ragdocs.toml serve --bind 0.0.0.0:7340
//! ```
//!
//! Results are printed to stdout as JSON; logs go to stderr.

use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;

use rag_docs::config::ConfigOverrides;
use rag_docs::logging;
use rag_docs::server::{self, DEFAULT_BIND};
use rag_docs::traits::ToolContext;

/// rag-docs: local document indexing and retrieval for AI tools.
///
/// Configuration is layered: built-in defaults, the optional `--config`
/// TOML file, `RAGDOCS_*` environment variables, then command flags.
#[derive(Parser)]
#[command(name = "ragdocs", version, about)]
struct Cli {
    /// Path to a configuration file (TOML).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level (RUST_LOG takes precedence).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Index the documents directory.
    ///
    /// Incremental by default: documents are added or overwritten by id and
    /// nothing is removed. `--rebuild` starts from an empty index.
    Build {
        #[arg(long)]
        docs_dir: Option<PathBuf>,

        #[arg(long)]
        data_dir: Option<PathBuf>,

        #[arg(long)]
        collection: Option<String>,

        /// Chunk size in characters.
        #[arg(long)]
        chunk_size: Option<i64>,

        /// Overlap between consecutive chunks in characters.
        #[arg(long, allow_hyphen_values = true)]
        chunk_overlap: Option<i64>,

        /// `sentence-transformer` or `simple`.
        #[arg(long)]
        embedding_backend: Option<String>,

        /// Delete the collection and document store first.
        #[arg(long)]
        rebuild: bool,
    },

    /// Rebuild the index from scratch with the resolved configuration.
    Refresh,

    /// Find the documents most relevant to a query.
    Query {
        /// Query text.
        text: String,

        #[arg(long)]
        data_dir: Option<PathBuf>,

        #[arg(long)]
        collection: Option<String>,

        /// Maximum number of documents to return.
        #[arg(long)]
        top_k: Option<i64>,

        /// `sentence-transformer` or `simple`.
        #[arg(long)]
        embedding_backend: Option<String>,
    },

    /// Report document and chunk counts.
    Status {
        #[arg(long)]
        data_dir: Option<PathBuf>,

        #[arg(long)]
        collection: Option<String>,
    },

    /// Start the HTTP tool server.
    Serve {
        /// Address to bind.
        #[arg(long, default_value = DEFAULT_BIND)]
        bind: String,
    },
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init_with_level(if cli.verbose {
        logging::VERBOSE_LEVEL
    } else {
        logging::DEFAULT_LEVEL
    });

    let ctx = ToolContext::new(cli.config.clone());

    match cli.command {
        Commands::Build {
            docs_dir,
            data_dir,
            collection,
            chunk_size,
            chunk_overlap,
            embedding_backend,
            rebuild,
        } => {
            let overrides = ConfigOverrides {
                docs_dir,
                data_dir,
                collection_name: collection,
                chunk_size,
                chunk_overlap,
                embedding_backend,
                ..Default::default()
            };
            print_json(&ctx.build(&overrides, rebuild).await?)?;
        }
        Commands::Refresh => {
            print_json(&ctx.build(&ConfigOverrides::default(), true).await?)?;
        }
        Commands::Query {
            text,
            data_dir,
            collection,
            top_k,
            embedding_backend,
        } => {
            let overrides = ConfigOverrides {
                data_dir,
                collection_name: collection,
                top_k,
                embedding_backend,
                ..Default::default()
            };
            print_json(&ctx.query(&text, &overrides).await?)?;
        }
        Commands::Status {
            data_dir,
            collection,
        } => {
            let overrides = ConfigOverrides {
                data_dir,
                collection_name: collection,
                ..Default::default()
            };
            print_json(&ctx.status(&overrides).await?)?;
        }
        Commands::Serve { bind } => {
            server::run_server(cli.config, &bind).await?;
        }
    }

    Ok(())
}
