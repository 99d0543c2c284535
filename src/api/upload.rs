// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Multipart upload extraction

use axum::body::Bytes;
use axum::http::StatusCode;
use axum_extra::extract::multipart::{Multipart, MultipartError, MultipartRejection};
use tracing::debug;

use crate::api::errors::ApiError;

/// Multipart field carrying the image
pub const UPLOAD_FIELD: &str = "file";

/// The uploaded image part
#[derive(Debug, Clone)]
pub struct Upload {
    pub bytes: Bytes,
    pub content_type: Option<String>,
    pub file_name: Option<String>,
}

/// Read the `file` part of a multipart body, ignoring other parts
pub async fn read_upload(
    multipart: Result<Multipart, MultipartRejection>,
    limit: usize,
) -> Result<Upload, ApiError> {
    let mut multipart =
        multipart.map_err(|e| ApiError::InvalidRequest(format!("expected a multipart upload: {}", e)))?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, limit))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            debug!("Skipping multipart field {:?}", field.name());
            continue;
        }

        let content_type = field.content_type().map(str::to_string);
        let file_name = field.file_name().map(str::to_string);
        let bytes = field.bytes().await.map_err(|e| multipart_error(e, limit))?;

        debug!(
            "Received upload {:?} ({:?}, {} bytes)",
            file_name,
            content_type,
            bytes.len()
        );

        return Ok(Upload {
            bytes,
            content_type,
            file_name,
        });
    }

    Err(ApiError::InvalidRequest(format!(
        "missing multipart field '{}'",
        UPLOAD_FIELD
    )))
}

fn multipart_error(e: MultipartError, limit: usize) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge { limit }
    } else {
        ApiError::InvalidRequest(format!("malformed multipart body: {}", e.body_text()))
    }
}
