//! Fixed-price real-time bidder.
//!
//! Loads agents, registers them with the agent-configuration service, starts
//! their pacers, and serves auctions until SIGINT/SIGTERM.

use anyhow::Context;
use bidder_agents::{AgentRegistry, AuctionDispatcher, HttpAgentConfigStore, HttpBanker};
use bidder_api::ApiServer;
use bidder_core::config::{load_agents_from_file, AppConfig};
use clap::Parser;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "rtb-bidder")]
#[command(about = "Fixed-price OpenRTB bidder")]
#[command(version)]
struct Cli {
    /// Agents configuration file (JSON array)
    #[arg(long, env = "RTB_BIDDER__AGENTS_FILE")]
    config: Option<String>,

    /// Auction port (overrides config)
    #[arg(long, env = "RTB_BIDDER__API__AUCTION_PORT")]
    auction_port: Option<u16>,

    /// Win notification port (overrides config)
    #[arg(long, env = "RTB_BIDDER__API__WIN_PORT")]
    win_port: Option<u16>,

    /// Event notification port (overrides config)
    #[arg(long, env = "RTB_BIDDER__API__EVENT_PORT")]
    event_port: Option<u16>,

    /// Error notification port (overrides config)
    #[arg(long, env = "RTB_BIDDER__API__ERROR_PORT")]
    error_port: Option<u16>,

    /// Do not start the Prometheus exporter
    #[arg(long, default_value_t = false)]
    no_metrics: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "rtb_bidder=info,bidder_agents=info,bidder_api=info,bidder_core=info".into()
            }),
        )
        .json()
        .init();

    let cli = Cli::parse();

    let mut config = AppConfig::load().unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        AppConfig::default()
    });

    if let Some(path) = cli.config {
        config.agents_file = path;
    }
    if let Some(port) = cli.auction_port {
        config.api.auction_port = port;
    }
    if let Some(port) = cli.win_port {
        config.api.win_port = port;
    }
    if let Some(port) = cli.event_port {
        config.api.event_port = port;
    }
    if let Some(port) = cli.error_port {
        config.api.error_port = port;
    }
    if cli.no_metrics {
        config.metrics.enabled = false;
    }

    info!(
        auction_port = config.api.auction_port,
        win_port = config.api.win_port,
        event_port = config.api.event_port,
        error_port = config.api.error_port,
        acs = %config.acs.base_url(),
        banker = %config.banker.base_url(),
        "Configuration loaded"
    );

    let definitions = load_agents_from_file(&config.agents_file)
        .with_context(|| format!("loading agents from {}", config.agents_file))?;

    let http = reqwest::Client::builder()
        .build()
        .context("building HTTP client")?;
    let store = Arc::new(HttpAgentConfigStore::new(http.clone(), &config.acs));
    let banker = Arc::new(HttpBanker::new(http, &config.banker));

    let shutdown = CancellationToken::new();
    let registry = AgentRegistry::new(definitions, store, banker, shutdown.clone());
    registry.start().await;

    let dispatcher = Arc::new(AuctionDispatcher::new(registry.agents()));
    let api_server = ApiServer::new(config.clone(), dispatcher);

    if config.metrics.enabled {
        if let Err(e) = api_server.start_metrics() {
            error!(error = %e, "Failed to start metrics exporter");
        }
    }

    let server_shutdown = shutdown.clone();
    let mut server = tokio::spawn(async move { api_server.serve(server_shutdown).await });

    info!("Bidder is ready to serve traffic");

    tokio::select! {
        _ = shutdown_signal() => info!("Shutdown signal received"),
        result = &mut server => {
            match result {
                Ok(Ok(())) => warn!("HTTP servers exited"),
                Ok(Err(e)) => error!(error = %e, "HTTP servers failed"),
                Err(e) => error!(error = %e, "HTTP server task panicked"),
            }
        }
    }

    // In-flight auctions are not drained.
    shutdown.cancel();
    registry.stop().await;
    server.abort();

    info!("Leaving");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
