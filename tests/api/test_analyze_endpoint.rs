// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! POST /analyze and POST /v1/analyze

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use base64::Engine;
use fabstir_moderation_node::api::{create_router, AppState};
use fabstir_moderation_node::config::{ModerationConfig, ServerConfig};
use fabstir_moderation_node::moderation::UNSAFE_REASON;
use fabstir_moderation_node::vision::nsfw::{ClassificationError, NsfwClassifier};
use fabstir_moderation_node::vision::{DecodedImage, ModerationModels};
use serde_json::{json, Value};

use crate::common::{
    black_image, encode_png, json_request, multipart_body, multipart_request, noisy_image,
    oversized_png, send,
    synthetic_detector, test_state, white_square_image, CountingDetector, FailingScore, FixedScore,
};

struct SlowScore;

impl NsfwClassifier for SlowScore {
    fn name(&self) -> &str {
        "slow"
    }

    fn score(&self, _image: &DecodedImage) -> Result<f32, ClassificationError> {
        std::thread::sleep(Duration::from_millis(500));
        Ok(0.0)
    }
}

fn router_with_score(score: f32) -> axum::Router {
    create_router(
        test_state(Arc::new(synthetic_detector()), Arc::new(FixedScore::new(score))),
        &ServerConfig::default(),
    )
}

fn json_body(body: &[u8]) -> Value {
    serde_json::from_slice(body).unwrap()
}

/// Test 1: Unsafe image with a face
#[tokio::test]
async fn test_analyze_returns_verdict() {
    let png = encode_png(&white_square_image(160, 60));
    let request = multipart_request("/analyze", multipart_body("file", "photo.png", "image/png", &png));

    let (status, _, body) = send(router_with_score(0.93), request).await;
    assert_eq!(status, StatusCode::OK);

    let verdict = json_body(&body);
    assert_eq!(verdict["faceDetected"], true);
    assert!(verdict["faceCount"].as_u64().unwrap() >= 1);
    assert_eq!(verdict["isSafe"], false);
    assert!((verdict["unsafeScore"].as_f64().unwrap() - 0.93).abs() < 1e-6);
    assert_eq!(verdict["reason"], UNSAFE_REASON);
}

/// Test 2: Safe image reports a null reason
#[tokio::test]
async fn test_analyze_safe_image() {
    let png = encode_png(&black_image(100, 100));
    let request = multipart_request("/analyze", multipart_body("file", "dark.png", "image/png", &png));

    let (status, _, body) = send(router_with_score(0.1), request).await;
    assert_eq!(status, StatusCode::OK);

    let verdict = json_body(&body);
    assert_eq!(verdict["faceDetected"], false);
    assert_eq!(verdict["faceCount"], 0);
    assert_eq!(verdict["isSafe"], true);
    assert!(verdict["reason"].is_null());
}

/// Test 3: Missing `file` field is a 400
#[tokio::test]
async fn test_missing_file_field() {
    let png = encode_png(&black_image(32, 32));
    let request = multipart_request("/analyze", multipart_body("image", "a.png", "image/png", &png));

    let (status, _, body) = send(router_with_score(0.1), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json_body(&body)["error_type"], "invalid_request");
}

/// Test 4: Non-multipart body is a 400
#[tokio::test]
async fn test_non_multipart_body() {
    let request = json_request("/analyze", &json!({"file": "nope"}));
    let (status, _, _) = send(router_with_score(0.1), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

/// Test 5: Undecodable upload is a 400 and never reaches the detector
#[tokio::test]
async fn test_invalid_image_rejected() {
    let detector = Arc::new(CountingDetector::new(Arc::new(synthetic_detector())));
    let scorer = Arc::new(FixedScore::new(0.1));
    let router = create_router(test_state(detector.clone(), scorer.clone()), &ServerConfig::default());

    let request = multipart_request(
        "/analyze",
        multipart_body("file", "fake.jpg", "image/jpeg", b"plain text pretending to be a jpeg"),
    );
    let (status, _, body) = send(router, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let error = json_body(&body);
    assert_eq!(error["error_type"], "invalid_image");
    assert!(error["detail"].as_str().is_some());
    assert_eq!(detector.calls(), 0);
    assert_eq!(scorer.calls(), 0);
}

/// Test 6: Scorer failure is a 500, not a safe verdict
#[tokio::test]
async fn test_classification_failure() {
    let router = create_router(
        test_state(Arc::new(synthetic_detector()), Arc::new(FailingScore)),
        &ServerConfig::default(),
    );
    let png = encode_png(&black_image(32, 32));
    let request = multipart_request("/analyze", multipart_body("file", "a.png", "image/png", &png));

    let (status, _, body) = send(router, request).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json_body(&body)["error_type"], "classification_error");
}

/// Test 7: Upload above the configured limit is a 413
#[tokio::test]
async fn test_upload_too_large() {
    let mut config = ModerationConfig::default();
    config.server.max_upload_bytes = 100;
    let models = ModerationModels::new(Arc::new(synthetic_detector()), Arc::new(FixedScore::new(0.1)));
    let router = create_router(AppState::new(models, &config), &config.server);

    let png = encode_png(&noisy_image(64, 64));
    assert!(png.len() > 100);
    let request = multipart_request("/analyze", multipart_body("file", "big.png", "image/png", &png));

    let (status, _, body) = send(router, request).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(json_body(&body)["error_type"], "payload_too_large");
}

/// Test 8: Upload declaring more pixels than allowed is a 413 before any decode
#[tokio::test]
async fn test_image_dimensions_too_large() {
    let detector = Arc::new(CountingDetector::new(Arc::new(synthetic_detector())));
    let scorer = Arc::new(FixedScore::new(0.1));
    let router = create_router(test_state(detector.clone(), scorer.clone()), &ServerConfig::default());

    let png = oversized_png(10_000, 10_000);
    let request = multipart_request("/analyze", multipart_body("file", "huge.png", "image/png", &png));
    let (status, _, body) = send(router, request).await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    let error = json_body(&body);
    assert_eq!(error["error_type"], "image_too_large");
    assert_eq!(error["details"]["width"], 10_000);
    assert_eq!(error["details"]["limit_pixels"], 40_000_000);
    assert_eq!(detector.calls(), 0);
    assert_eq!(scorer.calls(), 0);
}

/// Test 9: Pixel limit follows the server config
#[tokio::test]
async fn test_configured_pixel_limit() {
    let mut config = ModerationConfig::default();
    config.server.max_image_pixels = 32 * 32 - 1;
    let models = ModerationModels::new(Arc::new(synthetic_detector()), Arc::new(FixedScore::new(0.1)));
    let router = create_router(AppState::new(models, &config), &config.server);

    let png = encode_png(&black_image(32, 32));
    let encoded = base64::engine::general_purpose::STANDARD.encode(&png);
    let (status, _, body) = send(
        router,
        json_request("/v1/analyze", &json!({ "image": encoded, "format": "png" })),
    )
    .await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(json_body(&body)["error_type"], "image_too_large");
}

/// Test 10: Slow analysis hits the request timeout
#[tokio::test]
async fn test_request_timeout() {
    let state = test_state(Arc::new(synthetic_detector()), Arc::new(SlowScore))
        .with_request_timeout(Duration::from_millis(50));
    let router = create_router(state, &ServerConfig::default());
    let png = encode_png(&black_image(32, 32));
    let request = multipart_request("/analyze", multipart_body("file", "a.png", "image/png", &png));

    let (status, _, body) = send(router, request).await;
    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(json_body(&body)["error_type"], "timeout");
}

/// Test 11: Base64 JSON variant
#[tokio::test]
async fn test_base64_analyze() {
    let png = encode_png(&white_square_image(160, 60));
    let encoded = base64::engine::general_purpose::STANDARD.encode(&png);

    let (status, _, body) = send(
        router_with_score(0.2),
        json_request("/v1/analyze", &json!({ "image": encoded, "format": "png" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let verdict = json_body(&body);
    assert_eq!(verdict["faceDetected"], true);
    assert_eq!(verdict["isSafe"], true);

    let (status, _, body) = send(router_with_score(0.2), json_request("/v1/analyze", &json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json_body(&body)["error_type"], "validation_error");

    let (status, _, _) = send(
        router_with_score(0.2),
        json_request("/v1/analyze", &json!({ "image": "%%%not-base64%%%" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
