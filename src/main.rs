//! # Code Oracle CLI (`oracle`)
//!
//! ## Usage
//!
//! ```bash
//! oracle [--config ./oracle.toml] [--root DIR] <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `oracle build [--force]` | Index new and modified files |
//! | `oracle query "<text>"` | Retrieve the nearest chunks |
//! | `oracle symbol <name>` | Files likely referencing a symbol |
//! | `oracle overview` | Index status |
//! | `oracle memory` | Recent project activity |
//! | `oracle serve` | Start the HTTP server |
//!
//! Logs go to stderr and honour `RUST_LOG`; results go to stdout.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use code_oracle::config::{self, ROOT_ENV_VAR};
use code_oracle::{server, Oracle, OracleError};

/// Code Oracle: incremental code indexing and retrieval for coding agents.
#[derive(Parser)]
#[command(
    name = "oracle",
    about = "Code Oracle: incremental code indexing and retrieval for coding agents",
    version,
    long_about = "Code Oracle walks a source tree, extracts declaration-level chunks with \
    tree-sitter, embeds them into a local vector index, and answers natural-language \
    queries with the most relevant code and the files it lives in."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Optional: when the file does not exist, built-in defaults are used.
    #[arg(long, global = true, default_value = "./oracle.toml")]
    config: PathBuf,

    /// Directory to index.
    ///
    /// Overrides `ORACLE_ROOT_DIR` and `[index].root`.
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build or incrementally update the index.
    ///
    /// Only files whose modification time advanced since the last build are
    /// reindexed. Records of deleted files are purged.
    Build {
        /// Reindex every file regardless of modification time.
        #[arg(long)]
        force: bool,
    },

    /// Query the index in natural language.
    Query {
        /// The question or description to search for.
        text: String,

        /// Number of chunks to return (capped at `retrieval.max_k`).
        #[arg(short, long)]
        k: Option<usize>,

        /// Note stored with this query in project memory.
        #[arg(long)]
        insight: Option<String>,

        /// Print the raw JSON response.
        #[arg(long)]
        json: bool,
    },

    /// List files whose chunks are nearest to a symbol name.
    ///
    /// Approximate: uses similarity search, not a reference index.
    Symbol {
        name: String,
        #[arg(long)]
        json: bool,
    },

    /// Show index status and supported languages.
    Overview {
        #[arg(long)]
        json: bool,
    },

    /// Show recent project activity from the memory log.
    Memory {
        #[arg(short, long)]
        k: Option<usize>,
        #[arg(long)]
        json: bool,
    },

    /// Start the HTTP server on `[server].bind`.
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

    let mut cfg = config::load_config_or_default(&cli.config)?;
    if let Some(root) = cli.root {
        cfg.index.root = root;
    } else if let Ok(root) = std::env::var(ROOT_ENV_VAR) {
        cfg.index.root = PathBuf::from(root);
    }

    let oracle = Oracle::open(cfg)
        .await
        .with_context(|| "Failed to open index")?;

    match cli.command {
        Commands::Build { force } => {
            let report = oracle.build(force).await?;
            println!("Build {}", oracle.root().display());
            println!("  files scanned:   {}", report.files_scanned);
            println!("  files indexed:   {}", report.files_indexed);
            println!("    via fallback:  {}", report.files_fallback);
            println!("  files unchanged: {}", report.files_unchanged);
            println!("  files skipped:   {}", report.files_skipped);
            println!("  files removed:   {}", report.files_removed);
            println!("  files failed:    {}", report.files_failed);
            println!("  chunks written:  {}", report.chunks_written);
            println!("  total chunks:    {}", report.total_chunks);
            println!("  duration:        {}ms", report.duration_ms);
            for err in &report.errors {
                println!("  error: {}", err);
            }
            println!("ok");
        }
        Commands::Query {
            text,
            k,
            insight,
            json,
        } => {
            let response = oracle
                .query(&text, k, insight.as_deref())
                .await
                .map_err(cli_error)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else {
                for (i, hit) in response.results.iter().enumerate() {
                    let file = hit.metadata["file"].as_str().unwrap_or("?");
                    let line = hit.metadata["start_line"]
                        .as_u64()
                        .map(|l| format!(":{}", l))
                        .unwrap_or_default();
                    let symbol = hit.metadata["symbol"].as_str().unwrap_or("");
                    let kind = hit.metadata["kind"].as_str().unwrap_or("");
                    println!("{}. {}{} {} {}", i + 1, file, line, kind, symbol);
                }
                println!("files:");
                for file in &response.files {
                    println!("  {}", file);
                }
            }
        }
        Commands::Symbol { name, json } => {
            let usages = oracle.symbol_usages(&name).await.map_err(cli_error)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&usages)?);
            } else if usages.found_in_files.is_empty() {
                println!("No files found for {}.", usages.symbol);
            } else {
                for file in &usages.found_in_files {
                    println!("{}", file);
                }
            }
        }
        Commands::Overview { json } => {
            let overview = oracle.overview().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&overview)?);
            } else {
                println!("status:        {}", overview.status);
                println!("root:          {}", overview.root);
                println!("total chunks:  {}", overview.total_chunks);
                println!("tracked files: {}", overview.tracked_files);
                println!("memory:        {} entries", overview.memory_entries);
                println!("languages:     {}", overview.supported_languages.join(", "));
                println!("parsers:       {}", overview.loaded_languages.join(", "));
            }
        }
        Commands::Memory { k, json } => {
            let entries = oracle.memory_state(k).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else if entries.is_empty() {
                println!("No project memory yet.");
            } else {
                for entry in &entries {
                    println!("[{}] {}", entry.timestamp, entry.query);
                    if !entry.files.is_empty() {
                        println!("    files: {}", entry.files.join(", "));
                    }
                    if let Some(insight) = &entry.insight {
                        println!("    insight: {}", insight);
                    }
                }
            }
        }
        Commands::Serve => {
            server::run_server(Arc::new(oracle)).await?;
        }
    }

    Ok(())
}

fn cli_error(err: OracleError) -> anyhow::Error {
    match err {
        OracleError::EmptyIndex => anyhow::anyhow!("index is empty; run `oracle build` first"),
        other => other.into(),
    }
}
