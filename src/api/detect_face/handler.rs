// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Detect-face endpoint handler

use std::time::Instant;

use axum::{extract::State, Json};
use axum_extra::extract::multipart::{Multipart, MultipartRejection};
use tracing::warn;

use crate::api::errors::ApiError;
use crate::api::handlers::{record_failure, run_blocking};
use crate::api::server::AppState;
use crate::api::upload::read_upload;
use crate::moderation::FaceSummary;

/// POST /detect-face - Count faces in an uploaded image
///
/// Returns `{ "faceDetected": bool, "count": n }`. NSFW scoring is skipped.
pub async fn detect_face_handler(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<FaceSummary>, ApiError> {
    state.metrics.record_request();

    let result: Result<FaceSummary, ApiError> = async {
        let upload = read_upload(multipart, state.pipeline.max_image_bytes()).await?;
        let started = Instant::now();
        let summary = run_blocking(&state, move |pipeline| {
            pipeline.detect_faces(&upload.bytes, upload.content_type.as_deref())
        })
        .await?;
        state.metrics.record_faces(summary.count, started.elapsed());
        Ok(summary)
    }
    .await;

    if let Err(e) = &result {
        warn!("Detect-face request failed: {}", e);
        record_failure(&state.metrics, e);
    }

    result.map(Json)
}
