// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Analyze endpoint handlers

use std::time::Instant;

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use axum_extra::extract::multipart::{Multipart, MultipartRejection};
use tracing::warn;

use super::request::AnalyzeRequest;
use crate::api::errors::ApiError;
use crate::api::handlers::{record_failure, run_blocking};
use crate::api::server::AppState;
use crate::api::upload::read_upload;
use crate::moderation::Verdict;
use crate::vision::decode_base64_image;

/// POST /analyze - Moderate an uploaded image
///
/// # Request
/// multipart/form-data with the image in the `file` field
///
/// # Response
/// - `faceDetected`, `faceCount`: face detection result
/// - `isSafe`, `unsafeScore`: NSFW verdict against the configured threshold
/// - `reason`: set only when the image is unsafe
///
/// # Errors
/// - 400 Bad Request: missing `file` field or undecodable image
/// - 413 Payload Too Large: upload exceeds the byte or pixel limit
/// - 500 Internal Server Error: face detection or NSFW scoring failed
/// - 504 Gateway Timeout: analysis exceeded the request timeout
pub async fn analyze_handler(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Verdict>, ApiError> {
    state.metrics.record_request();

    let result: Result<Verdict, ApiError> = async {
        let upload = read_upload(multipart, state.pipeline.max_image_bytes()).await?;
        let started = Instant::now();
        let verdict = run_blocking(&state, move |pipeline| {
            pipeline.analyze(&upload.bytes, upload.content_type.as_deref())
        })
        .await?;
        state.metrics.record_verdict(&verdict, started.elapsed());
        Ok(verdict)
    }
    .await;

    if let Err(e) = &result {
        warn!("Analyze request failed: {}", e);
        record_failure(&state.metrics, e);
    }

    result.map(Json)
}

/// POST /v1/analyze - Moderate a base64-encoded image
///
/// # Request
/// - `image`: Base64-encoded image data (required)
/// - `format`: Image format hint (png, jpg, webp, gif, bmp, tiff) - defaults to "png"
pub async fn analyze_base64_handler(
    State(state): State<AppState>,
    request: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> Result<Json<Verdict>, ApiError> {
    state.metrics.record_request();

    let result: Result<Verdict, ApiError> = async {
        let Json(request) = request.map_err(|e| ApiError::InvalidRequest(e.body_text()))?;
        request.validate()?;
        let content_type = request.content_type();
        let image = request.image.unwrap_or_default();
        let started = Instant::now();
        let verdict = run_blocking(&state, move |pipeline| {
            let decoded =
                decode_base64_image(&image, Some(content_type.as_str()), pipeline.decode_limits())?;
            pipeline.analyze_decoded(&decoded)
        })
        .await?;
        state.metrics.record_verdict(&verdict, started.elapsed());
        Ok(verdict)
    }
    .await;

    if let Err(e) = &result {
        warn!("Analyze request failed: {}", e);
        record_failure(&state.metrics, e);
    }

    result.map(Json)
}

