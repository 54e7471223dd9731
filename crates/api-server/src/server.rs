//! API server: one auction listener plus one listener per notification kind.

use crate::rest::{self, AppState, NotificationKind};
use axum::routing::{get, post};
use axum::Router;
use bidder_agents::AuctionDispatcher;
use bidder_core::config::AppConfig;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Router for the auction listener. Bodies over `max_body_bytes` get no bid.
pub fn auction_router(dispatcher: Arc<AuctionDispatcher>, max_body_bytes: usize) -> Router {
    let state = AppState {
        dispatcher,
        start_time: Instant::now(),
        max_body_bytes,
    };

    Router::new()
        .route("/auctions", post(rest::handle_auction))
        .route("/health", get(rest::health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Router for a notification listener. Every request is acknowledged.
pub fn notification_router(kind: NotificationKind) -> Router {
    Router::new()
        .fallback(rest::handle_notification)
        .with_state(kind)
}

pub struct ApiServer {
    config: AppConfig,
    dispatcher: Arc<AuctionDispatcher>,
}

impl ApiServer {
    pub fn new(config: AppConfig, dispatcher: Arc<AuctionDispatcher>) -> Self {
        Self { config, dispatcher }
    }

    fn addr(&self, port: u16) -> anyhow::Result<SocketAddr> {
        let host: IpAddr = self.config.api.host.parse()?;
        Ok(SocketAddr::new(host, port))
    }

    /// Bind all four listeners and serve until `shutdown` is cancelled.
    ///
    /// Binding happens up front so a port conflict fails the whole server
    /// before any listener starts serving.
    pub async fn serve(&self, shutdown: CancellationToken) -> anyhow::Result<()> {
        let api = &self.config.api;

        let auction = TcpListener::bind(self.addr(api.auction_port)?).await?;
        let win = TcpListener::bind(self.addr(api.win_port)?).await?;
        let event = TcpListener::bind(self.addr(api.event_port)?).await?;
        let error = TcpListener::bind(self.addr(api.error_port)?).await?;

        tokio::try_join!(
            serve_on(
                "auction",
                auction,
                auction_router(self.dispatcher.clone(), api.max_body_bytes),
                shutdown.clone()
            ),
            serve_on(
                NotificationKind::Win.as_str(),
                win,
                notification_router(NotificationKind::Win),
                shutdown.clone()
            ),
            serve_on(
                NotificationKind::Event.as_str(),
                event,
                notification_router(NotificationKind::Event),
                shutdown.clone()
            ),
            serve_on(
                NotificationKind::Error.as_str(),
                error,
                notification_router(NotificationKind::Error),
                shutdown
            ),
        )?;

        Ok(())
    }

    /// Start the Prometheus exporter on its own port.
    pub fn start_metrics(&self) -> anyhow::Result<()> {
        let addr = self.addr(self.config.metrics.port)?;
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()?;

        info!(port = self.config.metrics.port, "Metrics exporter started");
        Ok(())
    }
}

async fn serve_on(
    name: &'static str,
    listener: TcpListener,
    app: Router,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    info!(listener = name, addr = %listener.local_addr()?, "Starting HTTP server");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    info!(listener = name, "HTTP server stopped");
    Ok(())
}
