//! # Clause Audit CLI (`cra`)
//!
//! ## Usage
//!
//! ```bash
//! cra --config ./config/cra.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `cra segment <file>` | Print the clauses of a contract |
//! | `cra analyze <file>` | Score every clause with the language model |
//! | `cra precedents init` | Create the SQLite precedent index |
//! | `cra precedents seed` | Embed the reference corpus into the index |
//! | `cra precedents query "<text>"` | Resolve precedents for a text |
//! | `cra traces` | Show the audit trace log |
//!
//! Logs go to stderr; set `RUST_LOG=info` (or `debug`) for more detail.

use clap::{Parser, Subcommand};
use clause_audit::{analyze, config, precedent_store, precedents, segment_cmd, trace_log};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Clause Audit: contract clause risk analysis with precedent retrieval
/// and an audit trail.
#[derive(Parser)]
#[command(
    name = "cra",
    about = "Clause Audit: contract clause risk analysis",
    version,
    long_about = "Clause Audit splits a contract into clauses, asks an OpenAI-compatible \
    language model for a risk score, reasons and a suggested redline per clause, attaches \
    similar reference clauses, and appends an audit trace of every analysis to a JSONL log."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// `segment` and `traces` run with built-in defaults when the file
    /// does not exist.
    #[arg(long, global = true, default_value = "./config/cra.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Segment a plain-text contract into clauses.
    Segment {
        /// UTF-8 text file.
        file: PathBuf,

        /// Print clauses as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Analyze every clause of a contract.
    ///
    /// Failed model calls are retried and then reported as degraded
    /// results (risk 0); the run never stops early.
    Analyze {
        /// UTF-8 text file.
        file: PathBuf,

        /// Maximum number of clauses sent to the model.
        #[arg(long)]
        max_clauses: Option<usize>,

        /// Number of precedents attached to each clause.
        #[arg(long)]
        top_k: Option<usize>,

        /// Print results as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Manage the semantic precedent index.
    Precedents {
        #[command(subcommand)]
        action: PrecedentsAction,
    },

    /// Show analysis traces, most recent last.
    Traces {
        /// Show only the last N entries.
        #[arg(long)]
        limit: Option<usize>,

        /// Print entries as JSON lines.
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum PrecedentsAction {
    /// Create the index schema. Idempotent.
    Init,

    /// Embed the reference corpus and upsert it into the index.
    Seed {
        /// Corpus file (JSON array of strings). Defaults to
        /// `precedents.corpus_path`.
        #[arg(long)]
        corpus: Option<PathBuf>,
    },

    /// Resolve precedents for a piece of text.
    Query {
        text: String,

        #[arg(long)]
        top_k: Option<usize>,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    // Commands that work without a config file
    match &cli.command {
        Commands::Segment { file, json } => {
            let cfg = load_or_minimal(&cli.config)?;
            segment_cmd::run_segment(&cfg, file, *json)?;
            return Ok(());
        }
        Commands::Traces { limit, json } => {
            let cfg = load_or_minimal(&cli.config)?;
            trace_log::run_traces(&cfg, *limit, *json)?;
            return Ok(());
        }
        _ => {}
    }

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Analyze {
            file,
            max_clauses,
            top_k,
            json,
        } => {
            analyze::run_analyze(&cfg, &file, max_clauses, top_k, json).await?;
        }
        Commands::Precedents { action } => match action {
            PrecedentsAction::Init => {
                precedents::run_init(&cfg).await?;
            }
            PrecedentsAction::Seed { corpus } => {
                precedent_store::run_seed(&cfg, corpus.as_deref()).await?;
            }
            PrecedentsAction::Query { text, top_k } => {
                precedents::run_query(&cfg, &text, top_k).await?;
            }
        },
        Commands::Segment { .. } | Commands::Traces { .. } => {
            // Handled above (before config loading)
            unreachable!()
        }
    }

    Ok(())
}

/// Load the config file if it exists; otherwise fall back to defaults.
/// A present but invalid file is still an error.
fn load_or_minimal(path: &std::path::Path) -> anyhow::Result<config::Config> {
    if path.exists() {
        config::load_config(path)
    } else {
        Ok(config::Config::minimal())
    }
}
