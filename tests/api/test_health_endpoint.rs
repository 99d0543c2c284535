// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Status, health, metrics and CORS

use std::sync::Arc;

use axum::http::{Request, StatusCode};
use fabstir_moderation_node::api::create_router;
use fabstir_moderation_node::config::ServerConfig;
use serde_json::Value;

use crate::common::{
    black_image, encode_png, get_request, multipart_body, multipart_request, send,
    synthetic_detector, test_state, FixedScore,
};

fn router() -> axum::Router {
    create_router(
        test_state(Arc::new(synthetic_detector()), Arc::new(FixedScore::new(0.7))),
        &ServerConfig::default(),
    )
}

/// Test 1: Root status message
#[tokio::test]
async fn test_root_status() {
    let (status, _, body) = send(router(), get_request("/")).await;
    assert_eq!(status, StatusCode::OK);

    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "Face Detection Service Running");
}

/// Test 2: Health lists both models
#[tokio::test]
async fn test_health() {
    let (status, _, body) = send(router(), get_request("/health")).await;
    assert_eq!(status, StatusCode::OK);

    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["nsfw_backend"], "fixed");
    assert!((json["threshold"].as_f64().unwrap() - 0.6).abs() < 1e-6);
    assert_eq!(json["models"].as_array().unwrap().len(), 2);
}

/// Test 3: Metrics count requests and verdicts
#[tokio::test]
async fn test_metrics_after_request() {
    let router = router();
    let png = encode_png(&black_image(32, 32));
    let request = multipart_request("/analyze", multipart_body("file", "a.png", "image/png", &png));
    let (status, _, _) = send(router.clone(), request).await;
    assert_eq!(status, StatusCode::OK);

    let (status, headers, body) = send(router, get_request("/metrics")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(headers["content-type"].to_str().unwrap().starts_with("text/plain"));

    let text = String::from_utf8(body).unwrap();
    assert!(text.contains("moderation_requests_total 1"));
    assert!(text.contains("moderation_unsafe_verdicts_total 1"));
}

/// Test 4: Any origin is allowed by default
#[tokio::test]
async fn test_cors_allows_any_origin() {
    let request = Request::builder()
        .uri("/")
        .header("origin", "https://frontend.example.com")
        .body(axum::body::Body::empty())
        .unwrap();

    let (status, headers, _) = send(router(), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers["access-control-allow-origin"], "*");
}

/// Test 5: Unknown routes are 404
#[tokio::test]
async fn test_unknown_route() {
    let (status, _, _) = send(router(), get_request("/describe-image")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
