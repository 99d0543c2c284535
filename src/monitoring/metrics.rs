// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Moderation Prometheus Metrics
//!
//! Counters for analyzed images, rejected uploads and backend failures.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::moderation::Verdict;

/// Moderation metrics for Prometheus
#[derive(Debug, Clone, Default)]
pub struct ModerationMetrics {
    /// Requests received by the moderation endpoints
    requests_total: Arc<AtomicU64>,
    /// Completed analyses
    analyses_completed: Arc<AtomicU64>,
    /// Uploads rejected as invalid images or requests
    invalid_images_total: Arc<AtomicU64>,
    /// Face detection or NSFW scoring failures
    classification_errors_total: Arc<AtomicU64>,
    /// Analyses that exceeded the request timeout
    timeouts_total: Arc<AtomicU64>,
    /// Verdicts marked unsafe
    unsafe_verdicts_total: Arc<AtomicU64>,
    /// Faces found across all analyses
    faces_detected_total: Arc<AtomicU64>,
    /// Cumulative analysis time
    analysis_duration_ms: Arc<AtomicU64>,
}

impl ModerationMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_request(&self) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a completed analysis
    pub fn record_verdict(&self, verdict: &Verdict, duration: Duration) {
        self.analyses_completed.fetch_add(1, Ordering::Relaxed);
        self.faces_detected_total
            .fetch_add(verdict.face_count as u64, Ordering::Relaxed);
        if !verdict.is_safe {
            self.unsafe_verdicts_total.fetch_add(1, Ordering::Relaxed);
        }
        self.analysis_duration_ms
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
    }

    /// Record a face-only detection
    pub fn record_faces(&self, count: usize, duration: Duration) {
        self.analyses_completed.fetch_add(1, Ordering::Relaxed);
        self.faces_detected_total
            .fetch_add(count as u64, Ordering::Relaxed);
        self.analysis_duration_ms
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn record_invalid_image(&self) {
        self.invalid_images_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_classification_error(&self) {
        self.classification_errors_total
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_timeout(&self) {
        self.timeouts_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn requests_total(&self) -> u64 {
        self.requests_total.load(Ordering::Relaxed)
    }

    pub fn invalid_images_total(&self) -> u64 {
        self.invalid_images_total.load(Ordering::Relaxed)
    }

    pub fn unsafe_verdicts_total(&self) -> u64 {
        self.unsafe_verdicts_total.load(Ordering::Relaxed)
    }

    /// Average analysis time in milliseconds
    pub fn avg_analysis_ms(&self) -> f64 {
        let count = self.analyses_completed.load(Ordering::Relaxed);
        if count == 0 {
            return 0.0;
        }
        self.analysis_duration_ms.load(Ordering::Relaxed) as f64 / count as f64
    }

    /// Export metrics in Prometheus text format
    pub fn export_prometheus(&self) -> String {
        format!(
            r#"# HELP moderation_requests_total Total number of moderation requests
# TYPE moderation_requests_total counter
moderation_requests_total {}

# HELP moderation_analyses_completed Number of completed analyses
# TYPE moderation_analyses_completed counter
moderation_analyses_completed {}

# HELP moderation_invalid_images_total Number of rejected uploads
# TYPE moderation_invalid_images_total counter
moderation_invalid_images_total {}

# HELP moderation_classification_errors_total Number of detector or classifier failures
# TYPE moderation_classification_errors_total counter
moderation_classification_errors_total {}

# HELP moderation_timeouts_total Number of analyses that timed out
# TYPE moderation_timeouts_total counter
moderation_timeouts_total {}

# HELP moderation_unsafe_verdicts_total Number of unsafe verdicts
# TYPE moderation_unsafe_verdicts_total counter
moderation_unsafe_verdicts_total {}

# HELP moderation_faces_detected_total Number of faces detected
# TYPE moderation_faces_detected_total counter
moderation_faces_detected_total {}

# HELP moderation_analysis_duration_ms_avg Average analysis time in milliseconds
# TYPE moderation_analysis_duration_ms_avg gauge
moderation_analysis_duration_ms_avg {:.2}
"#,
            self.requests_total.load(Ordering::Relaxed),
            self.analyses_completed.load(Ordering::Relaxed),
            self.invalid_images_total.load(Ordering::Relaxed),
            self.classification_errors_total.load(Ordering::Relaxed),
            self.timeouts_total.load(Ordering::Relaxed),
            self.unsafe_verdicts_total.load(Ordering::Relaxed),
            self.faces_detected_total.load(Ordering::Relaxed),
            self.avg_analysis_ms(),
        )
    }
}
