// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use thiserror::Error;

use crate::vision::face::DetectionError;
use crate::vision::image_utils::ImageError;
use crate::vision::nsfw::ClassificationError;

/// Failure kinds of one moderation run
#[derive(Debug, Error)]
pub enum ModerationError {
    /// The upload could not be decoded; never reaches the detectors
    #[error("Invalid image file: {0}")]
    InvalidImage(#[from] ImageError),

    /// A model could not be loaded at startup
    #[error("Failed to load model: {0}")]
    ModelLoad(String),

    /// Face detection or NSFW scoring failed for this request
    #[error("Classification failed: {0}")]
    Classification(String),
}

impl ModerationError {
    pub fn is_client_error(&self) -> bool {
        matches!(self, ModerationError::InvalidImage(_))
    }
}

impl From<ClassificationError> for ModerationError {
    fn from(e: ClassificationError) -> Self {
        ModerationError::Classification(e.to_string())
    }
}

impl From<DetectionError> for ModerationError {
    fn from(e: DetectionError) -> Self {
        ModerationError::Classification(format!("face detection: {}", e))
    }
}
