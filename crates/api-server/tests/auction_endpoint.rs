//! Drives the auction and notification routers end to end, in process.

use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use bidder_agents::{AuctionDispatcher, BiddingAgent};
use bidder_api::{auction_router, notification_router, NotificationKind};
use bidder_core::config::ApiConfig;
use bidder_core::openrtb::BidResponse;
use bidder_core::types::AgentDefinition;
use std::sync::Arc;
use tower::ServiceExt;

const SCENARIO: &str =
    r#"{"id":"r1","imp":[{"id":"1","ext":{"external-ids":[42],"creative-ids":{"42":[0]}}}]}"#;

fn definition(name: &str, external_id: i64) -> AgentDefinition {
    serde_json::from_value(serde_json::json!({
        "name": name,
        "config": {
            "account": ["hello", "world"],
            "externalId": external_id,
            "creatives": [{"format": "300x250", "id": 5, "name": "LuxuryBigBox"}]
        },
        "price": 1.5,
        "period": 1000,
        "balance": 1000
    }))
    .unwrap()
}

fn app_with_limit(external_id: i64, max_body_bytes: usize) -> Router {
    let agents: Vec<Arc<BiddingAgent>> =
        vec![Arc::new(BiddingAgent::new(definition("my_agent", external_id)))];
    auction_router(Arc::new(AuctionDispatcher::new(agents.into())), max_body_bytes)
}

fn app(external_id: i64) -> Router {
    app_with_limit(external_id, ApiConfig::default().max_body_bytes)
}

/// The matching request, padded with a top-level ext string of `pad` bytes.
fn padded_scenario(pad: usize) -> String {
    format!(
        r#"{{"id":"r1","ext":{{"pad":"{}"}},"imp":[{{"id":"1","ext":{{"external-ids":[42],"creative-ids":{{"42":[0]}}}}}}]}}"#,
        "x".repeat(pad)
    )
}

fn post_auction(body: &str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/auctions")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_matching_agent_bids() {
    let response = app(42).oneshot(post_auction(SCENARIO)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "application/json");
    assert_eq!(response.headers()["x-openrtb-version"], "2.1");

    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let bid_response: BidResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(bid_response.id, "r1");
    assert_eq!(bid_response.seatbid.len(), 1);

    let bid = &bid_response.seatbid[0].bid[0];
    assert_eq!(bid.id, "0");
    assert_eq!(bid.impid, "1");
    assert_eq!(bid.crid.as_deref(), Some("5"));
    assert_eq!(bid.price, 1.5);
    assert_eq!(bid.ext.as_ref().unwrap()["external-id"], 42);
}

#[tokio::test]
async fn test_unmatched_agent_is_no_content() {
    let response = app(99).oneshot(post_auction(SCENARIO)).await.unwrap();

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert!(body.is_empty());
}

#[tokio::test]
async fn test_malformed_body_is_no_content() {
    for body in ["", "{", r#"{"imp": []}"#, "null"] {
        let response = app(42).oneshot(post_auction(body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT, "body {body:?}");
    }
}

#[tokio::test]
async fn test_large_valid_body_still_bids() {
    let body = padded_scenario(3 * 1024 * 1024);
    let response = app(42).oneshot(post_auction(&body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let bid_response: BidResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(bid_response.bid_count(), 1);
}

#[tokio::test]
async fn test_body_over_limit_is_no_content() {
    let body = padded_scenario(4096);
    let response = app_with_limit(42, 1024)
        .oneshot(post_auction(&body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert!(body.is_empty());
}

#[tokio::test]
async fn test_unknown_path_is_not_found() {
    let request = Request::builder()
        .method(Method::POST)
        .uri("/bid")
        .body(Body::from(SCENARIO))
        .unwrap();
    let response = app(42).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_health_reports_agents() {
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let response = app(42).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let health: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(health["agents"], 1);
    assert_eq!(health["registered"], 0);
}

#[tokio::test]
async fn test_notifications_accept_anything() {
    for kind in [NotificationKind::Win, NotificationKind::Event, NotificationKind::Error] {
        for (method, uri) in [(Method::POST, "/"), (Method::GET, "/win/abc"), (Method::PUT, "/x")] {
            let request = Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::from("{\"anything\": true}"))
                .unwrap();
            let response = notification_router(kind).oneshot(request).await.unwrap();

            assert_eq!(response.status(), StatusCode::OK);
            let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
            assert!(body.is_empty());
        }
    }
}
