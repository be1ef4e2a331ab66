use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod config;
mod resolver;

#[derive(Parser)]
#[command(name = "akahu-sync", version, about = "Reconciles Akahu accounts with YNAB and Actual Budget")]
struct Cli {
    /// Path to the TOML config file (defaults to the platform config dir).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Overrides the mapping file location.
    #[arg(long, global = true)]
    mapping_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch account snapshots, reconcile the mapping, and interactively
    /// match anything unmapped.
    Map {
        /// After confirmation, remove mapping state for accounts that have
        /// vanished upstream.
        #[arg(long)]
        prune: bool,
        /// Use name similarity for suggestions even when OpenAI is
        /// configured.
        #[arg(long)]
        no_ai: bool,
    },
    /// Push transactions and balance adjustments into every mapped ledger
    /// account.
    Sync,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut settings = config::Settings::load(cli.config.as_deref())?;
    if let Some(path) = cli.mapping_file {
        settings.sync.mapping_file = Some(path);
    }

    match cli.command {
        Command::Map { prune, no_ai } => commands::run_map(&settings, prune, no_ai).await,
        Command::Sync => commands::run_sync(&settings).await,
    }
}
