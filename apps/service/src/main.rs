use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use linkwatch_service::journal::JournalLayer;
use linkwatch_service::{Config, Orchestrator};
use tracing::info;

/// Headless link-quality monitor
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Path to the TOML config (defaults to $XDG_CONFIG_HOME/linkwatch/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Run a single measurement and exit; the exit status reports the outcome
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    let (journal_layer, journal_rx) = JournalLayer::new();
    logger::init_tracing_with(journal_layer);

    let config = Config::from_config(args.config.as_deref())?;
    info!("{}", config);

    let mut orchestrator = Orchestrator::new(config).await?;

    if args.once {
        let outcome = orchestrator.handle().scheduler.trigger_once().await;
        return Ok(if outcome.is_success() { ExitCode::SUCCESS } else { ExitCode::FAILURE });
    }

    orchestrator.start(Some(journal_rx));
    tokio::signal::ctrl_c().await?;
    orchestrator.shutdown().await;

    Ok(ExitCode::SUCCESS)
}
