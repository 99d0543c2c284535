// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! POST /detect-face

use std::sync::Arc;

use axum::http::StatusCode;
use fabstir_moderation_node::api::create_router;
use fabstir_moderation_node::config::ServerConfig;
use serde_json::Value;

use crate::common::{
    black_image, encode_png, multipart_body, multipart_request, send, synthetic_detector,
    test_state, white_square_image, FixedScore,
};

/// Test 1: Face found, scorer untouched
#[tokio::test]
async fn test_detect_face_counts_faces() {
    let scorer = Arc::new(FixedScore::new(0.99));
    let router = create_router(
        test_state(Arc::new(synthetic_detector()), scorer.clone()),
        &ServerConfig::default(),
    );
    let png = encode_png(&white_square_image(160, 60));
    let request = multipart_request("/detect-face", multipart_body("file", "face.png", "image/png", &png));

    let (status, _, body) = send(router, request).await;
    assert_eq!(status, StatusCode::OK);

    let summary: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(summary["faceDetected"], true);
    assert!(summary["count"].as_u64().unwrap() >= 1);
    assert!(summary.get("isSafe").is_none());
    assert_eq!(scorer.calls(), 0);
}

/// Test 2: No face
#[tokio::test]
async fn test_detect_face_empty_image() {
    let router = create_router(
        test_state(Arc::new(synthetic_detector()), Arc::new(FixedScore::new(0.0))),
        &ServerConfig::default(),
    );
    let png = encode_png(&black_image(160, 160));
    let request = multipart_request("/detect-face", multipart_body("file", "dark.png", "image/png", &png));

    let (status, _, body) = send(router, request).await;
    assert_eq!(status, StatusCode::OK);

    let summary: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(summary["faceDetected"], false);
    assert_eq!(summary["count"], 0);
}

/// Test 3: Garbage upload is a 400
#[tokio::test]
async fn test_detect_face_invalid_image() {
    let router = create_router(
        test_state(Arc::new(synthetic_detector()), Arc::new(FixedScore::new(0.0))),
        &ServerConfig::default(),
    );
    let request = multipart_request(
        "/detect-face",
        multipart_body("file", "x.png", "image/png", &[0x89, 0x50, 0x4E, 0x47, 0x00]),
    );

    let (status, _, _) = send(router, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
