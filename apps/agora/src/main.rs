//! # Agora - Social Graph Backend
//!
//! The main binary for the Agora social backend.
//!
//! This application provides:
//! - HTTP REST API server (axum-based)
//! - CLI interface for store operations and demo data
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                apps/agora (THE BINARY)               │
//! │                                                      │
//! │  ┌─────────────┐    ┌─────────────┐    ┌──────────┐  │
//! │  │   CLI       │    │   HTTP API  │    │  Config  │  │
//! │  │  (clap)     │    │   (axum)    │    │  (toml)  │  │
//! │  └──────┬──────┘    └──────┬──────┘    └────┬─────┘  │
//! │         │                  │                │        │
//! │         └──────────────────┼────────────────┘        │
//! │                            ▼                         │
//! │                    ┌───────────────┐                 │
//! │                    │  agora-core   │                 │
//! │                    │ (THE LOGIC)   │                 │
//! │                    └───────────────┘                 │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Start the HTTP server
//! agora server --host 0.0.0.0 --port 8080
//!
//! # CLI operations
//! agora --backend file --database demo.snapshot seed
//! agora status
//! agora follow user1 user2
//! agora search "rust" --as user1
//! agora feed user1
//! ```

mod cli;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    // AGORA_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("AGORA_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "agora=info,agora_core=info,tower_http=debug".into());

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

    let cli = cli::Cli::parse();

    if !cli.quiet && !cli.json_mode {
        print_banner();
    }

    if let Err(e) = cli::execute(cli).await {
        tracing::error!(kind = ?e.kind(), "Error: {}", e);
        std::process::exit(1);
    }
}

/// Print the Agora startup banner.
fn print_banner() {
    println!(
        r#"
   █████╗  ██████╗  ██████╗ ██████╗  █████╗
  ██╔══██╗██╔════╝ ██╔═══██╗██╔══██╗██╔══██╗
  ███████║██║  ███╗██║   ██║██████╔╝███████║
  ██╔══██║██║   ██║██║   ██║██╔══██╗██╔══██║
  ██║  ██║╚██████╔╝╚██████╔╝██║  ██║██║  ██║
  ╚═╝  ╚═╝ ╚═════╝  ╚═════╝ ╚═╝  ╚═╝╚═╝  ╚═╝

  Agora v{}

  Follow graph • Visibility • Interest feeds
"#,
        env!("CARGO_PKG_VERSION")
    );
}
