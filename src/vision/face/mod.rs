// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Haar cascade face detection
//!
//! Classical sliding-window detection over the grayscale view of an upload,
//! using a pretrained OpenCV cascade.

pub mod cascade;
pub mod detector;
pub mod integral;

pub use cascade::{CascadeError, HaarCascade, HaarFeature, HaarRect, Stage, TreeNode, WeakClassifier};
pub use detector::{
    group_rectangles, DetectionError, DetectorConfig, FaceDetector, FaceRect, HaarFaceDetector,
    WindowSize, GROUP_EPS,
};
pub use integral::IntegralImage;
