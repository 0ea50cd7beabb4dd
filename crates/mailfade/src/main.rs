//! `mailfade` - disposable email inboxes from the command line.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Disposable email inboxes backed by a public mail provider.
#[derive(Debug, Parser)]
#[command(name = "mailfade", version, about)]
pub struct Cli {
    /// Database path (defaults under the user data directory).
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Provider base URL.
    #[arg(long, global = true, default_value = mailfade_api::DEFAULT_BASE_URL)]
    pub api: String,

    /// Inbox lifetime in seconds.
    #[arg(long, global = true, default_value_t = mailfade_core::inbox::DEFAULT_TTL_SECS)]
    pub ttl_secs: i64,

    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create a new inbox.
    New {
        /// Keep watching the inbox after creating it.
        #[arg(long)]
        watch: bool,
    },
    /// Show the current inbox and its remaining lifetime.
    Status,
    /// List messages in the current inbox.
    Messages,
    /// Show one message.
    Read {
        /// Message identifier.
        id: String,
    },
    /// Delete one message.
    DeleteMessage {
        /// Message identifier.
        id: String,
    },
    /// Delete the current inbox.
    Delete,
    /// Watch the current inbox for new mail until it expires.
    Watch,
    /// Run a cleanup sweep over expired accounts now.
    Cleanup,
    /// Show aggregate account statistics.
    Stats,
    /// Show recent audit log entries.
    Audit {
        /// Maximum number of entries to show.
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
    /// Wipe all local state: accounts, logs, and the session.
    Reset,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("mailfade=info,mailfade_core=info")),
        )
        .init();

    let cli = Cli::parse();
    commands::run(cli).await
}
