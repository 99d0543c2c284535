// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::moderation::ModerationError;
use crate::vision::image_utils::ImageError;

/// Error body returned by every endpoint
///
/// `detail` repeats the cause text under the key older face-detection
/// clients read.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorResponse {
    pub error_type: String,
    pub message: String,
    pub request_id: Option<String>,
    pub detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<HashMap<String, serde_json::Value>>,
}

#[derive(Debug, Clone)]
pub enum ApiError {
    NotFound(String),
    InvalidRequest(String),
    ValidationError { field: String, message: String },
    InvalidImage(String),
    PayloadTooLarge { limit: usize },
    ImageTooLarge { width: u32, height: u32, max_pixels: u64 },
    ClassificationFailed(String),
    ServiceUnavailable(String),
    InternalError(String),
    Timeout,
}

impl ApiError {
    pub fn to_response(&self, request_id: Option<String>) -> ErrorResponse {
        let (error_type, message, details) = match self {
            ApiError::NotFound(msg) => ("not_found", msg.clone(), None),
            ApiError::InvalidRequest(msg) => ("invalid_request", msg.clone(), None),
            ApiError::ValidationError { field, message } => {
                let mut details = HashMap::new();
                details.insert(
                    "field".to_string(),
                    serde_json::Value::String(field.clone()),
                );
                ("validation_error", message.clone(), Some(details))
            }
            ApiError::InvalidImage(msg) => ("invalid_image", msg.clone(), None),
            ApiError::PayloadTooLarge { limit } => {
                let mut details = HashMap::new();
                details.insert(
                    "limit_bytes".to_string(),
                    serde_json::Value::Number((*limit).into()),
                );
                (
                    "payload_too_large",
                    format!("Upload exceeds {} bytes", limit),
                    Some(details),
                )
            }
            ApiError::ImageTooLarge {
                width,
                height,
                max_pixels,
            } => {
                let mut details = HashMap::new();
                details.insert("width".to_string(), serde_json::Value::Number((*width).into()));
                details.insert("height".to_string(), serde_json::Value::Number((*height).into()));
                details.insert(
                    "limit_pixels".to_string(),
                    serde_json::Value::Number((*max_pixels).into()),
                );
                (
                    "image_too_large",
                    format!(
                        "Image is {}x{} pixels, limit is {} pixels",
                        width, height, max_pixels
                    ),
                    Some(details),
                )
            }
            ApiError::ClassificationFailed(msg) => ("classification_error", msg.clone(), None),
            ApiError::ServiceUnavailable(msg) => ("service_unavailable", msg.clone(), None),
            ApiError::InternalError(msg) => ("internal_error", msg.clone(), None),
            ApiError::Timeout => ("timeout", "Request timed out".to_string(), None),
        };

        ErrorResponse {
            error_type: error_type.to_string(),
            detail: message.clone(),
            message,
            request_id,
            details,
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::NotFound(_) => 404,
            ApiError::InvalidRequest(_)
            | ApiError::ValidationError { .. }
            | ApiError::InvalidImage(_) => 400,
            ApiError::PayloadTooLarge { .. } | ApiError::ImageTooLarge { .. } => 413,
            ApiError::ClassificationFailed(_) | ApiError::InternalError(_) => 500,
            ApiError::ServiceUnavailable(_) => 503,
            ApiError::Timeout => 504,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::InvalidRequest(msg) => write!(f, "Invalid request: {}", msg),
            ApiError::ValidationError { field, message } => {
                write!(f, "Validation error for {}: {}", field, message)
            }
            ApiError::InvalidImage(msg) => write!(f, "Invalid image file: {}", msg),
            ApiError::PayloadTooLarge { limit } => write!(f, "Upload exceeds {} bytes", limit),
            ApiError::ImageTooLarge {
                width,
                height,
                max_pixels,
            } => write!(
                f,
                "Image is {}x{} pixels, limit is {} pixels",
                width, height, max_pixels
            ),
            ApiError::ClassificationFailed(msg) => write!(f, "Classification failed: {}", msg),
            ApiError::ServiceUnavailable(msg) => write!(f, "Service unavailable: {}", msg),
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
            ApiError::Timeout => write!(f, "Request timed out"),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<ModerationError> for ApiError {
    fn from(e: ModerationError) -> Self {
        match e {
            ModerationError::InvalidImage(ImageError::TooLarge(_, limit)) => {
                ApiError::PayloadTooLarge { limit }
            }
            ModerationError::InvalidImage(ImageError::TooManyPixels(width, height, max_pixels)) => {
                ApiError::ImageTooLarge {
                    width,
                    height,
                    max_pixels,
                }
            }
            ModerationError::InvalidImage(inner) => ApiError::InvalidImage(inner.to_string()),
            ModerationError::ModelLoad(msg) => ApiError::ServiceUnavailable(msg),
            ModerationError::Classification(msg) => ApiError::ClassificationFailed(msg),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = self.to_response(Some(uuid::Uuid::new_v4().to_string()));
        (status, Json(body)).into_response()
    }
}
