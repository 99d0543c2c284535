// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Per-image moderation pipeline
//!
//! bytes -> decode -> {grayscale -> face scan, RGB -> NSFW score} -> verdict
//!
//! All methods are synchronous and CPU bound; async callers run them on the
//! blocking pool.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, info, warn};

use super::errors::ModerationError;
use super::verdict::{FaceSummary, Verdict, VerdictComposer};
use crate::vision::face::{FaceDetector, FaceRect};
use crate::vision::image_utils::{decode_image_with_hint, DecodeLimits, DecodedImage};
use crate::vision::model_manager::ModerationModels;
use crate::vision::nsfw::NsfwClassifier;

#[derive(Clone)]
pub struct ModerationPipeline {
    face_detector: Arc<dyn FaceDetector>,
    nsfw_classifier: Arc<dyn NsfwClassifier>,
    composer: VerdictComposer,
    limits: DecodeLimits,
}

impl std::fmt::Debug for ModerationPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModerationPipeline")
            .field("nsfw_backend", &self.nsfw_classifier.name())
            .field("composer", &self.composer)
            .field("limits", &self.limits)
            .finish_non_exhaustive()
    }
}

impl ModerationPipeline {
    pub fn new(
        face_detector: Arc<dyn FaceDetector>,
        nsfw_classifier: Arc<dyn NsfwClassifier>,
        composer: VerdictComposer,
    ) -> Self {
        Self {
            face_detector,
            nsfw_classifier,
            composer,
            limits: DecodeLimits::default(),
        }
    }

    pub fn from_models(models: &ModerationModels, composer: VerdictComposer) -> Self {
        Self::new(models.face_detector(), models.nsfw_classifier(), composer)
    }

    pub fn with_max_image_bytes(mut self, max_image_bytes: usize) -> Self {
        self.limits.max_bytes = max_image_bytes;
        self
    }

    pub fn with_max_image_pixels(mut self, max_image_pixels: u64) -> Self {
        self.limits.max_pixels = max_image_pixels;
        self
    }

    pub fn threshold(&self) -> f32 {
        self.composer.threshold()
    }

    pub fn max_image_bytes(&self) -> usize {
        self.limits.max_bytes
    }

    pub fn decode_limits(&self) -> DecodeLimits {
        self.limits
    }

    pub fn decode(&self, bytes: &[u8], content_type: Option<&str>) -> Result<DecodedImage, ModerationError> {
        decode_image_with_hint(bytes, content_type, self.limits).map_err(|e| {
            warn!("Rejected upload ({} bytes): {}", bytes.len(), e);
            ModerationError::InvalidImage(e)
        })
    }

    /// Full analysis of an uploaded image
    pub fn analyze(&self, bytes: &[u8], content_type: Option<&str>) -> Result<Verdict, ModerationError> {
        let image = self.decode(bytes, content_type)?;
        self.analyze_decoded(&image)
    }

    /// Analysis of an already decoded image
    ///
    /// The face scan and NSFW scoring run concurrently; both always run, and
    /// a failure in either fails the request.
    pub fn analyze_decoded(&self, image: &DecodedImage) -> Result<Verdict, ModerationError> {
        let started = Instant::now();

        let (faces, score) = std::thread::scope(|scope| {
            let faces = scope.spawn(|| self.face_detector.detect(&image.gray));
            let score = self.nsfw_classifier.score(image);
            (faces.join(), score)
        });

        let faces = faces
            .map_err(|_| ModerationError::Classification("face detection panicked".to_string()))?
            .map_err(|e| {
                error!("Face detection failed: {}", e);
                ModerationError::from(e)
            })?;

        let score = score.map_err(|e| {
            error!("NSFW scoring with {} backend failed: {}", self.nsfw_classifier.name(), e);
            ModerationError::from(e)
        })?;

        debug!("Raw unsafe score: {:.4}", score);
        let verdict = self.composer.compose(&faces, score);

        info!(
            "Moderation verdict: faces={} safe={} score={:.3} ({}x{}, {:?})",
            verdict.face_count,
            verdict.is_safe,
            verdict.unsafe_score,
            image.width(),
            image.height(),
            started.elapsed()
        );

        Ok(verdict)
    }

    /// Face detection only
    pub fn detect_faces(&self, bytes: &[u8], content_type: Option<&str>) -> Result<FaceSummary, ModerationError> {
        let image = self.decode(bytes, content_type)?;
        let faces = self.find_faces(&image)?;
        info!("Face detection: {} faces", faces.len());
        Ok(FaceSummary::from_faces(&faces))
    }

    pub fn find_faces(&self, image: &DecodedImage) -> Result<Vec<FaceRect>, ModerationError> {
        self.face_detector.detect(&image.gray).map_err(|e| {
            error!("Face detection failed: {}", e);
            ModerationError::from(e)
        })
    }
}
