//! # Agora CLI Module
//!
//! This module implements the CLI interface for Agora.
//!
//! ## Available Commands
//!
//! - `server` - Start the HTTP server
//! - `init` - Initialize a new database
//! - `status` - Show store metrics
//! - `seed` - Populate a database with deterministic demo data
//! - `follow` - Follow / unfollow / request between two accounts
//! - `feed` - Show an account's personalized feed
//! - `search` - List public posts, optionally recording the search

mod commands;

use agora::config::{AgoraConfig, BackendKind};
use agora_core::AgoraError;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use commands::{
    FeedArgs, SearchArgs, cmd_feed, cmd_follow, cmd_init, cmd_search, cmd_seed, cmd_server,
    cmd_status,
};

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Agora - social graph backend
///
/// Follow graph, visibility policy and interest-ranked feeds.
#[derive(Parser, Debug)]
#[command(name = "agora")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// TOML configuration file
    #[arg(short = 'c', long, global = true)]
    pub config: Option<PathBuf>,

    /// Path to the database (overrides the configuration)
    #[arg(short = 'D', long, global = true)]
    pub database: Option<PathBuf>,

    /// Storage backend: "redb" (ACID database), "file" (snapshot) or "memory"
    #[arg(short = 'B', long, global = true)]
    pub backend: Option<String>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start HTTP server
    Server {
        /// Host to bind to
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port to bind to
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Initialize a new empty database
    Init {
        /// Force initialization even if database exists
        #[arg(short, long)]
        force: bool,
    },

    /// Show store metrics
    Status,

    /// Populate an empty database with demo accounts, posts and searches
    Seed {
        /// Number of accounts
        #[arg(long, default_value = "5")]
        accounts: usize,

        /// Number of posts
        #[arg(long, default_value = "20")]
        posts: usize,
    },

    /// Toggle a follow from one account to another (by username)
    Follow {
        /// Acting account
        actor: String,

        /// Account to follow, unfollow or request
        target: String,
    },

    /// Show the personalized feed of an account
    Feed(FeedArgs),

    /// List public posts
    Search(SearchArgs),
}

// =============================================================================
// CONFIGURATION RESOLUTION
// =============================================================================

/// Load the configuration file and environment, then apply global flags.
fn resolve_config(cli: &Cli) -> Result<AgoraConfig, AgoraError> {
    let mut config = AgoraConfig::load(cli.config.as_deref())?;
    if let Some(database) = &cli.database {
        config.storage.database = database.clone();
    }
    if let Some(raw) = &cli.backend {
        config.storage.backend = BackendKind::parse(raw).ok_or_else(|| {
            AgoraError::InvalidInput(format!(
                "Unknown backend '{}'. Use: redb, file, memory",
                raw
            ))
        })?;
    }
    Ok(config)
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), AgoraError> {
    let mut config = resolve_config(&cli)?;
    let json_mode = cli.json_mode;

    match cli.command {
        Some(Commands::Server { host, port }) => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            cmd_server(&config).await
        }
        Some(Commands::Init { force }) => cmd_init(&config.storage, force),
        Some(Commands::Status) | None => cmd_status(&config.storage, json_mode),
        Some(Commands::Seed { accounts, posts }) => {
            cmd_seed(&config.storage, json_mode, accounts, posts)
        }
        Some(Commands::Follow { actor, target }) => {
            cmd_follow(&config.storage, json_mode, &actor, &target)
        }
        Some(Commands::Feed(args)) => cmd_feed(&config.storage, json_mode, &args),
        Some(Commands::Search(args)) => cmd_search(&config.storage, json_mode, &args),
    }
}

// =============================================================================
// TESTS
// =============================================================================
