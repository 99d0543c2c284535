// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Path-based NSFW backend
//!
//! Some classifiers only accept a file path. The decoded image is written as a
//! PNG to a randomly named temporary file that is removed when the guard drops,
//! whichever way scoring ends.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use image::ImageFormat;
use tracing::{debug, warn};

use super::{normalize_score, ClassificationError, NsfwClassifier};
use crate::vision::image_utils::DecodedImage;

/// Label carrying the unsafe probability
pub const UNSAFE_LABEL: &str = "unsafe";

/// Classifier that reads an image from disk and returns label probabilities
#[cfg_attr(test, mockall::automock)]
pub trait PathClassifier: Send + Sync {
    fn classify_path(&self, path: &Path) -> Result<HashMap<String, f32>, ClassificationError>;
}

pub struct TempFileNsfwBackend<C> {
    classifier: C,
    temp_dir: PathBuf,
}

impl<C: PathClassifier> TempFileNsfwBackend<C> {
    /// Backend writing into the system temp directory
    pub fn new(classifier: C) -> Self {
        Self {
            classifier,
            temp_dir: std::env::temp_dir(),
        }
    }

    pub fn with_temp_dir(mut self, temp_dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = temp_dir.into();
        self
    }

    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }
}

impl<C> std::fmt::Debug for TempFileNsfwBackend<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TempFileNsfwBackend")
            .field("temp_dir", &self.temp_dir)
            .finish_non_exhaustive()
    }
}

impl<C: PathClassifier> NsfwClassifier for TempFileNsfwBackend<C> {
    fn name(&self) -> &str {
        "temp-file"
    }

    fn score(&self, image: &DecodedImage) -> Result<f32, ClassificationError> {
        let mut temp = tempfile::Builder::new()
            .prefix("moderation-")
            .suffix(".png")
            .tempfile_in(&self.temp_dir)?;

        image
            .rgb
            .write_to(temp.as_file_mut(), ImageFormat::Png)
            .map_err(|e| ClassificationError::Encode(e.to_string()))?;

        debug!("Classifying temporary file {}", temp.path().display());
        let outcome = self.classifier.classify_path(temp.path());

        if let Err(e) = temp.close() {
            warn!("Failed to remove temporary classifier input: {}", e);
        }

        let labels = outcome?;
        let raw = labels
            .get(UNSAFE_LABEL)
            .copied()
            .ok_or_else(|| ClassificationError::MissingLabel(UNSAFE_LABEL.to_string()))?;

        normalize_score(raw)
    }
}
