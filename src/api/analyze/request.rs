// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Base64 analyze request types and validation

use serde::{Deserialize, Serialize};

use crate::api::errors::ApiError;

/// Supported image formats
const SUPPORTED_FORMATS: &[&str] = &["png", "jpg", "jpeg", "webp", "gif", "bmp", "tiff"];

fn default_format() -> String {
    "png".to_string()
}

/// Request for JSON image moderation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeRequest {
    /// Base64-encoded image data
    #[serde(default)]
    pub image: Option<String>,

    /// Image format hint
    #[serde(default = "default_format")]
    pub format: String,
}

impl AnalyzeRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.image.as_ref().map(|s| s.is_empty()).unwrap_or(true) {
            return Err(ApiError::ValidationError {
                field: "image".to_string(),
                message: "image is required".to_string(),
            });
        }

        if !SUPPORTED_FORMATS.contains(&self.format.to_lowercase().as_str()) {
            return Err(ApiError::ValidationError {
                field: "format".to_string(),
                message: format!(
                    "unsupported format '{}', supported: {:?}",
                    self.format, SUPPORTED_FORMATS
                ),
            });
        }

        Ok(())
    }

    /// The format hint as a MIME type for the decoder
    pub fn content_type(&self) -> String {
        format!("image/{}", self.format.to_lowercase())
    }
}
