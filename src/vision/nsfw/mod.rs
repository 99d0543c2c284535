// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! NSFW scoring backends
//!
//! Two interchangeable backends produce a single unsafe score in [0, 1]:
//! - [`TempFileNsfwBackend`]: hands a path-based classifier a temporary PNG
//! - [`LabelScoreNsfwBackend`]: reads the "nsfw" label of an in-memory classifier
//!
//! The backend is chosen once at startup from configuration.

pub mod label_scores;
pub mod onnx;
pub mod preprocessing;
pub mod temp_file;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::vision::image_utils::DecodedImage;

pub use label_scores::{nsfw_label_score, LabelClassifier, LabelScoreNsfwBackend, NSFW_LABEL};
pub use onnx::{load_labels, OnnxImageClassifier, OnnxNudityClassifier};
pub use temp_file::{PathClassifier, TempFileNsfwBackend, UNSAFE_LABEL};

/// Errors raised while scoring an image
#[derive(Debug, Error)]
pub enum ClassificationError {
    #[error("Temporary file error: {0}")]
    TempFile(#[from] std::io::Error),

    #[error("Failed to encode image for classifier: {0}")]
    Encode(String),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Classifier output has no '{0}' label")]
    MissingLabel(String),

    #[error("Classifier returned a non-numeric score")]
    InvalidScore,
}

/// A backend that scores how likely an image is unsafe
pub trait NsfwClassifier: Send + Sync {
    /// Short backend name for logs and health output
    fn name(&self) -> &str;

    /// Unsafe probability in [0, 1]
    fn score(&self, image: &DecodedImage) -> Result<f32, ClassificationError>;
}

/// Backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum NsfwBackendKind {
    /// Path-based classifier fed through a temporary file
    TempFile,
    /// In-memory multi-label classifier
    #[default]
    Labels,
}

impl std::fmt::Display for NsfwBackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NsfwBackendKind::TempFile => write!(f, "temp-file"),
            NsfwBackendKind::Labels => write!(f, "labels"),
        }
    }
}

/// Clamp a raw backend score into [0, 1], rejecting NaN
pub fn normalize_score(raw: f32) -> Result<f32, ClassificationError> {
    if raw.is_nan() {
        return Err(ClassificationError::InvalidScore);
    }
    Ok(raw.clamp(0.0, 1.0))
}
