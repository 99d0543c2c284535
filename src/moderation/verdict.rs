// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Safety verdict composition

use serde::{Deserialize, Serialize};

use crate::vision::face::FaceRect;

/// Default unsafe threshold
pub const DEFAULT_UNSAFE_THRESHOLD: f32 = 0.6;

/// Reason attached to every unsafe verdict
pub const UNSAFE_REASON: &str = "Inappropriate content detected";

/// Moderation result returned to clients
///
/// Field names are part of the public contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Verdict {
    pub face_detected: bool,
    pub face_count: usize,
    pub is_safe: bool,
    pub unsafe_score: f32,
    pub reason: Option<String>,
}

/// Face-only result of the detect-face endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaceSummary {
    pub face_detected: bool,
    pub count: usize,
}

impl FaceSummary {
    pub fn from_faces(faces: &[FaceRect]) -> Self {
        Self {
            face_detected: !faces.is_empty(),
            count: faces.len(),
        }
    }
}

/// Merges face detections and an NSFW score into a [`Verdict`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VerdictComposer {
    threshold: f32,
}

impl Default for VerdictComposer {
    fn default() -> Self {
        Self::new(DEFAULT_UNSAFE_THRESHOLD)
    }
}

impl VerdictComposer {
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn compose(&self, faces: &[FaceRect], unsafe_score: f32) -> Verdict {
        let is_safe = unsafe_score < self.threshold;
        Verdict {
            face_detected: !faces.is_empty(),
            face_count: faces.len(),
            is_safe,
            unsafe_score,
            reason: (!is_safe).then(|| UNSAFE_REASON.to_string()),
        }
    }
}
