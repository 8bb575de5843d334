mod commands;
mod config;

use clap::{Parser, Subcommand};
use config::CliConfig;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use wager_core::{BetEngine, BetError, FixedIdentity, IdentityProvider, NoIdentity, SqliteBetStore};

#[derive(Parser)]
#[command(name = "wager")]
#[command(about = "Record, accept and settle informal wagers")]
#[command(version)]
struct Cli {
    /// Data directory for bet storage
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    /// Acting identity (email); falls back to WAGER_IDENTITY
    #[arg(short, long, global = true)]
    identity: Option<String>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create, inspect and watch bets
    #[command(subcommand)]
    Bet(commands::BetCommands),

    /// Answer a bet invitation
    #[command(subcommand)]
    Respond(commands::RespondCommands),

    /// Cast and inspect votes
    #[command(subcommand)]
    Vote(commands::VoteCommands),
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = CliConfig::default();

    // Initialize logging
    let log_level = if cli.verbose || config.verbose {
        "debug"
    } else {
        "info"
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(format!(
            "wager={}",
            log_level
        )))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let data_dir = cli.data_dir.unwrap_or(config.data_dir);
    tokio::fs::create_dir_all(&data_dir).await?;
    tracing::debug!("bet store at {}", data_dir.display());

    let identity: Arc<dyn IdentityProvider> = match cli
        .identity
        .or_else(|| std::env::var("WAGER_IDENTITY").ok())
    {
        Some(email) => Arc::new(FixedIdentity::new(email)),
        None => Arc::new(NoIdentity),
    };

    let store = Arc::new(SqliteBetStore::new(&data_dir.join("wager.db")).await?);
    let engine = BetEngine::new(store, identity);

    let result = match cli.command {
        Commands::Bet(cmd) => commands::handle_bet_command(cmd, &engine).await,
        Commands::Respond(cmd) => commands::handle_respond_command(cmd, &engine).await,
        Commands::Vote(cmd) => commands::handle_vote_command(cmd, &engine).await,
    };

    if let Err(e) = result {
        match e {
            BetError::NotAuthenticated => {
                eprintln!("Error: no acting identity");
                eprintln!("Pass --identity <email> or set WAGER_IDENTITY");
            }
            BetError::BetNotFound { id } => {
                eprintln!("Error: bet '{}' not found", id);
                eprintln!("Use 'wager bet list' to see your bets");
            }
            BetError::InvalidTransition(msg) => {
                eprintln!("Error: {}", msg);
            }
            _ => {
                eprintln!("Error: {}", e);
                if e.is_retryable() {
                    eprintln!("This looks transient; retrying the same command is safe.");
                }
            }
        }
        std::process::exit(1);
    }

    Ok(())
}
