// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Haar face detector tests against the synthetic cascade

use fabstir_moderation_node::vision::face::{
    DetectorConfig, FaceDetector, HaarFaceDetector, WindowSize,
};
use fabstir_moderation_node::vision::DecodedImage;
use image::GrayImage;

use crate::common::{black_image, synthetic_detector, synthetic_face_cascade, white_square_image};

fn gray(image: image::RgbImage) -> GrayImage {
    DecodedImage::from_rgb(image).gray
}

/// Test 1: A flat black image has no faces
#[test]
fn test_black_image_has_no_faces() {
    let faces = synthetic_detector().detect(&gray(black_image(160, 160))).unwrap();
    assert!(faces.is_empty());
}

/// Test 2: A bright centred square is found and located
#[test]
fn test_white_square_is_detected() {
    let faces = synthetic_detector()
        .detect(&gray(white_square_image(160, 60)))
        .unwrap();

    assert!(!faces.is_empty());
    assert!(
        faces.iter().any(|f| {
            f.x <= 80 && f.y <= 80 && f.x + f.width >= 80 && f.y + f.height >= 80
        }),
        "no detection covers the square centre: {:?}",
        faces
    );
    for face in &faces {
        assert!(face.x < 160 && face.y < 160);
    }
}

/// Test 3: Detection is deterministic
#[test]
fn test_detection_is_repeatable() {
    let detector = synthetic_detector();
    let image = gray(white_square_image(160, 60));
    let first = detector.detect(&image).unwrap();
    let second = detector.detect(&image).unwrap();
    assert_eq!(first, second);
}

/// Test 4: Images smaller than the minimum window yield nothing
#[test]
fn test_image_smaller_than_window() {
    let faces = synthetic_detector().detect(&gray(white_square_image(20, 10))).unwrap();
    assert!(faces.is_empty());

    let config = DetectorConfig {
        min_size: WindowSize::square(200),
        ..Default::default()
    };
    let detector = HaarFaceDetector::new(synthetic_face_cascade(), config).unwrap();
    assert!(detector.detect(&gray(white_square_image(160, 60))).unwrap().is_empty());
}

/// Test 5: Grouping never returns more rectangles than raw candidates
#[test]
fn test_grouping_reduces_candidates() {
    let detector = synthetic_detector();
    let image = gray(white_square_image(160, 60));
    let raw = detector.candidates(&image).unwrap();
    let grouped = detector.detect(&image).unwrap();

    assert!(raw.len() > 5);
    assert!(grouped.len() <= raw.len());
}

/// Test 6: Invalid tuning is rejected up front
#[test]
fn test_invalid_config_rejected() {
    let config = DetectorConfig {
        scale_factor: 1.0,
        ..Default::default()
    };
    assert!(HaarFaceDetector::new(synthetic_face_cascade(), config).is_err());

    let config = DetectorConfig {
        min_size: WindowSize::square(60),
        max_size: Some(WindowSize::square(40)),
        ..Default::default()
    };
    assert!(HaarFaceDetector::new(synthetic_face_cascade(), config).is_err());
}
