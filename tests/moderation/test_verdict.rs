// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Verdict composition and its wire shape

use fabstir_moderation_node::moderation::{Verdict, VerdictComposer, UNSAFE_REASON};
use fabstir_moderation_node::vision::face::FaceRect;

/// Test 1: Score exactly at the threshold is unsafe
#[test]
fn test_threshold_is_inclusive() {
    let composer = VerdictComposer::new(0.6);
    let at = composer.compose(&[], 0.6);
    assert!(!at.is_safe);
    assert_eq!(at.reason.as_deref(), Some(UNSAFE_REASON));

    let below = composer.compose(&[], 0.6 - f32::EPSILON);
    assert!(below.is_safe);
    assert!(below.reason.is_none());
}

/// Test 2: Faces never change safety
#[test]
fn test_faces_are_independent_of_safety() {
    let composer = VerdictComposer::default();
    let faces = vec![FaceRect::new(0, 0, 40, 40), FaceRect::new(50, 0, 40, 40)];

    let safe = composer.compose(&faces, 0.1);
    assert!(safe.is_safe);
    assert_eq!(safe.face_count, 2);
    assert!(safe.face_detected);

    let unsafe_no_faces = composer.compose(&[], 0.95);
    assert!(!unsafe_no_faces.is_safe);
    assert!(!unsafe_no_faces.face_detected);
}

/// Test 3: JSON uses the client-facing camelCase names
#[test]
fn test_verdict_json_shape() {
    let verdict = VerdictComposer::default().compose(&[FaceRect::new(1, 2, 30, 30)], 0.93);
    let json = serde_json::to_value(&verdict).unwrap();

    assert_eq!(json["faceDetected"], true);
    assert_eq!(json["faceCount"], 1);
    assert_eq!(json["isSafe"], false);
    assert!((json["unsafeScore"].as_f64().unwrap() - 0.93).abs() < 1e-6);
    assert_eq!(json["reason"], UNSAFE_REASON);

    let back: Verdict = serde_json::from_value(json).unwrap();
    assert_eq!(back, verdict);
}

/// Test 4: Safe verdicts serialise reason as null
#[test]
fn test_safe_reason_is_null() {
    let json = serde_json::to_value(VerdictComposer::default().compose(&[], 0.0)).unwrap();
    assert!(json["reason"].is_null());
}
