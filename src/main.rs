//! # SKG-IF API CLI (`skgif`)
//!
//! The `skgif` binary initializes the databases, imports study documents,
//! inspects products and topics, and runs the HTTP server.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `skgif init` | Create the study and cache databases |
//! | `skgif import <file>` | Import studies from a JSON array or JSON-lines file |
//! | `skgif get <id>` | Print one study as a JSON-LD Product |
//! | `skgif topics "<term>"` | Search thesaurus labels |
//! | `skgif serve` | Start the SKG-IF HTTP server |
//!
//! Log verbosity follows `RUST_LOG` (default `info`).

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use skgif_api::{config, get, ingest, migrate, search, server};

/// SKG-IF API: study metadata and thesaurus concepts as SKG-IF JSON-LD.
#[derive(Parser)]
#[command(name = "skgif", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/skgif.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schemas.
    ///
    /// Idempotent: running it multiple times is safe.
    Init,

    /// Import study documents.
    ///
    /// Accepts a JSON array or one JSON document per line. Studies are
    /// upserted by aggregator identifier, else study number; studies with
    /// neither are skipped.
    Import {
        /// Path to the studies file.
        file: PathBuf,
    },

    /// Print one study as a JSON-LD Product.
    Get {
        /// Study number, record id, or a URL ending in one.
        id: String,
    },

    /// Search thesaurus labels.
    Topics {
        /// Label text (at least 3 characters).
        term: String,

        /// Two-letter label language.
        #[arg(long, default_value = "en")]
        lang: String,
    },

    /// Start the SKG-IF HTTP server.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Import { file } => {
            ingest::run_import(&cfg, &file).await?;
        }
        Commands::Get { id } => {
            get::run_get(&cfg, &id).await?;
        }
        Commands::Topics { term, lang } => {
            search::run_topics(&cfg, &term, &lang)?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
