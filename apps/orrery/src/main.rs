//! # Orrery - Universe Graph Server
//!
//! The main binary for the orrery knowledge-graph engine.
//!
//! This application provides:
//! - HTTP REST API server (axum-based, access-mode gated)
//! - CLI interface for universe operations
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                  apps/orrery (THE BINARY)                  │
//! │                                                            │
//! │   ┌─────────────┐    ┌─────────────┐    ┌─────────────┐   │
//! │   │    CLI      │    │  HTTP API   │    │   Config    │   │
//! │   │   (clap)    │    │   (axum)    │    │   (toml)    │   │
//! │   └──────┬──────┘    └──────┬──────┘    └──────┬──────┘   │
//! │          │                  │                  │           │
//! │          └──────────────────┼──────────────────┘           │
//! │                             ▼                              │
//! │                     ┌──────────────┐    ┌─────────────┐   │
//! │                     │ orrery-core  │    │ orrery-llm  │   │
//! │                     │ (THE LOGIC)  │    │ (drafting)  │   │
//! │                     └──────────────┘    └─────────────┘   │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Start the HTTP server
//! orrery serve --host 0.0.0.0 --port 3001
//!
//! # CLI operations
//! orrery status
//! orrery verify node rust-axum approve --reason "shipped to prod"
//! orrery gaps --refresh
//! ```

mod api;
mod cli;
mod config;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    // Initialize tracing — ORRERY_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("ORRERY_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "orrery=info,tower_http=debug".into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    // Parse CLI arguments
    let cli = cli::Cli::parse();

    // Display startup banner
    if !cli.quiet {
        print_banner();
    }

    // Execute command
    if let Err(e) = cli::execute(cli).await {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Print the orrery startup banner.
fn print_banner() {
    println!(
        r#"
   ██████╗ ██████╗ ██████╗ ███████╗██████╗ ██╗   ██╗
  ██╔═══██╗██╔══██╗██╔══██╗██╔════╝██╔══██╗╚██╗ ██╔╝
  ██║   ██║██████╔╝██████╔╝█████╗  ██████╔╝ ╚████╔╝
  ██║   ██║██╔══██╗██╔══██╗██╔══╝  ██╔══██╗  ╚██╔╝
  ╚██████╔╝██║  ██║██║  ██║███████╗██║  ██║   ██║
   ╚═════╝ ╚═╝  ╚═╝╚═╝  ╚═╝╚══════╝╚═╝  ╚═╝   ╚═╝

  Universe Graph Server v{}

  Deterministic • Integer-scored • Mode-gated
"#,
        env!("CARGO_PKG_VERSION")
    );
}
