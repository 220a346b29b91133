#![warn(clippy::all, clippy::pedantic)]

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use actix_web::{App, HttpServer, web};
use clap::Parser;
use linkwatch_service::journal::JournalLayer;
use linkwatch_service::{Config, MonitorHandle, Orchestrator};
use tracing::info;

mod error;
mod routes;

use error::AppError;

/// Link-quality monitor with an HTTP API
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Path to the TOML config (defaults to $XDG_CONFIG_HOME/linkwatch/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the bind address from the config
    #[arg(long)]
    bind: Option<String>,

    /// Override the port from the config
    #[arg(short, long)]
    port: Option<u16>,
}

#[actix_web::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let (journal_layer, journal_rx) = JournalLayer::new();
    logger::init_tracing_with(journal_layer);

    let mut config = Config::from_config(args.config.as_deref())?;
    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    info!("{}", config);

    let addr = SocketAddr::new(config.server.bind.parse::<IpAddr>()?, config.server.port);

    let mut orchestrator = Orchestrator::new(config).await?;
    orchestrator.start(Some(journal_rx));

    let result = run_server(addr, orchestrator.handle()).await;
    orchestrator.shutdown().await;
    result
}

async fn run_server(addr: SocketAddr, monitor: MonitorHandle) -> Result<(), AppError> {
    let monitor = web::Data::new(monitor);
    info!("Listening on http://{}", addr);

    HttpServer::new(move || {
        App::new()
            .app_data(monitor.clone())
            .app_data(routes::json_config())
            .configure(routes::routes)
    })
    .bind(addr)?
    .run()
    .await?;

    Ok(())
}
