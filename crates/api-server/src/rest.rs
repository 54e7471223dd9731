//! HTTP handlers for the auction endpoint and the notification endpoints.

use axum::body::{to_bytes, Body};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use bidder_agents::{AuctionDispatcher, AuctionOutcome};
use bidder_core::openrtb::{OPENRTB_VERSION, OPENRTB_VERSION_HEADER};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, warn};

/// Shared state for the auction router.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<AuctionDispatcher>,
    pub start_time: Instant,
    pub max_body_bytes: usize,
}

/// POST /auctions: OpenRTB bid request endpoint.
///
/// The body is read raw, bypassing the extractor body limit, so that an
/// unparsable or oversized request is answered like any other no-bid: 204
/// with no body.
pub async fn handle_auction(State(state): State<AppState>, body: Body) -> Response {
    let body = match to_bytes(body, state.max_body_bytes).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(error = %e, limit = state.max_body_bytes, "Rejecting bid request body");
            metrics::counter!("bidder.requests.malformed").increment(1);
            return StatusCode::NO_CONTENT.into_response();
        }
    };

    match state.dispatcher.handle(&body) {
        AuctionOutcome::Bid(response) => match serde_json::to_vec(&response) {
            Ok(payload) => (
                StatusCode::OK,
                [
                    ("content-type", "application/json"),
                    (OPENRTB_VERSION_HEADER, OPENRTB_VERSION),
                ],
                payload,
            )
                .into_response(),
            Err(e) => {
                error!(error = %e, request_id = %response.id, "Failed to encode bid response");
                metrics::counter!("bidder.responses.encode_errors").increment(1);
                StatusCode::NO_CONTENT.into_response()
            }
        },
        AuctionOutcome::NoBid => StatusCode::NO_CONTENT.into_response(),
    }
}

/// GET /health: health check endpoint.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let agents = state.dispatcher.agents();
    Json(HealthResponse {
        status: "healthy".to_string(),
        agents: agents.len(),
        registered: agents.iter().filter(|a| a.is_registered()).count(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub agents: usize,
    pub registered: usize,
    pub uptime_secs: u64,
}

/// Which exchange callback a notification listener receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Win,
    Event,
    Error,
}

impl NotificationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            NotificationKind::Win => "win",
            NotificationKind::Event => "event",
            NotificationKind::Error => "error",
        }
    }

    fn counter_name(self) -> &'static str {
        match self {
            NotificationKind::Win => "bidder.wins",
            NotificationKind::Event => "bidder.events",
            NotificationKind::Error => "bidder.errors",
        }
    }
}

/// Any method, any path: count it and acknowledge with an empty 200.
pub async fn handle_notification(State(kind): State<NotificationKind>) -> StatusCode {
    metrics::counter!(kind.counter_name()).increment(1);
    StatusCode::OK
}
