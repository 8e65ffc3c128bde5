//! # Command-Line Interface
//!
//! Defines the clap command tree and dispatches to the command
//! implementations in [`commands`]. Global flags (database path,
//! backend, JSON output) apply to every subcommand; running with no
//! subcommand prints the status summary.

pub mod commands;

pub use commands::*;

use crate::config::{self, FileConfig};
use clap::{Parser, Subcommand};
use orrery_core::OrreryError;
use std::path::PathBuf;

/// Knowledge-graph scoring and verification engine
#[derive(Parser)]
#[command(name = "orrery", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Database file path (default: orrery.redb)
    #[arg(short = 'D', long, global = true)]
    pub database: Option<PathBuf>,

    /// Storage backend: redb or memory
    #[arg(short = 'B', long, global = true)]
    pub backend: Option<String>,

    /// Emit machine-readable JSON instead of formatted text
    #[arg(long = "json", global = true)]
    pub json_mode: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server
    Serve {
        /// Host address to bind to
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Show universe totals and cluster scores
    Status,

    /// Show the moderation queue
    Queue,

    /// Approve, reject, or defer a node or edge
    Verify {
        /// Entity type: node or edge
        entity_type: String,

        /// Entity id
        entity_id: String,

        /// Action: approve, reject, or defer
        action: String,

        /// Optional reason recorded in the audit log
        #[arg(long)]
        reason: Option<String>,
    },

    /// List learning gaps
    Gaps {
        /// Re-run gap detection before listing
        #[arg(long)]
        refresh: bool,
    },

    /// Regenerate and list opportunities
    Opportunities,

    /// Export a canonical snapshot to a file
    Export {
        /// Output file path
        output: PathBuf,
    },

    /// Import a canonical snapshot from a file
    Import {
        /// Input file path
        input: PathBuf,
    },
}

/// Resolve shared settings and dispatch to the selected command.
///
/// Precedence for the database path and backend is flag, then config
/// file, then built-in default.
pub async fn execute(cli: Cli) -> Result<(), OrreryError> {
    let file = FileConfig::discover()?;
    let json_mode = cli.json_mode;

    let db_path = cli
        .database
        .or_else(|| file.database.clone())
        .unwrap_or_else(|| PathBuf::from(config::DEFAULT_DATABASE));
    let backend = resolve_backend(cli.backend.as_deref().or(file.backend.as_deref()))?;

    match cli.command {
        Some(Commands::Serve { host, port }) => {
            cmd_serve(&db_path, backend, &file, host.as_deref(), port).await
        }
        Some(Commands::Status) => cmd_status(&db_path, backend, json_mode),
        Some(Commands::Queue) => cmd_queue(&db_path, backend, json_mode),
        Some(Commands::Verify {
            entity_type,
            entity_id,
            action,
            reason,
        }) => cmd_verify(
            &db_path,
            backend,
            json_mode,
            &entity_type,
            &entity_id,
            &action,
            reason.as_deref(),
        ),
        Some(Commands::Gaps { refresh }) => cmd_gaps(&db_path, backend, json_mode, refresh),
        Some(Commands::Opportunities) => cmd_opportunities(&db_path, backend, json_mode),
        Some(Commands::Export { output }) => cmd_export(&db_path, backend, &output),
        Some(Commands::Import { input }) => cmd_import(&db_path, backend, &input),
        None => {
            // No subcommand - show status by default
            cmd_status(&db_path, backend, json_mode)
        }
    }
}
