// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! In-memory NSFW backend over a multi-label image classifier

use image::RgbImage;
use tracing::debug;

use super::{normalize_score, ClassificationError, NsfwClassifier};
use crate::vision::image_utils::DecodedImage;

/// Label carrying the unsafe probability
pub const NSFW_LABEL: &str = "nsfw";

/// Classifier returning `(label, score)` pairs ordered by descending score
pub trait LabelClassifier: Send + Sync {
    fn classify(&self, image: &RgbImage) -> Result<Vec<(String, f32)>, ClassificationError>;
}

/// Score of the first "nsfw" label (ASCII case-insensitive), 0.0 when absent
pub fn nsfw_label_score(predictions: &[(String, f32)]) -> f32 {
    predictions
        .iter()
        .find(|(label, _)| label.eq_ignore_ascii_case(NSFW_LABEL))
        .map(|(_, score)| *score)
        .unwrap_or(0.0)
}

#[derive(Debug)]
pub struct LabelScoreNsfwBackend<C> {
    classifier: C,
}

impl<C: LabelClassifier> LabelScoreNsfwBackend<C> {
    pub fn new(classifier: C) -> Self {
        Self { classifier }
    }
}

impl<C: LabelClassifier> NsfwClassifier for LabelScoreNsfwBackend<C> {
    fn name(&self) -> &str {
        "labels"
    }

    fn score(&self, image: &DecodedImage) -> Result<f32, ClassificationError> {
        let predictions = self.classifier.classify(&image.rgb)?;
        debug!("Label predictions: {:?}", predictions);
        normalize_score(nsfw_label_score(&predictions))
    }
}
