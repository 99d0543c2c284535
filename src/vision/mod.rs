// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Vision processing for image moderation
//!
//! This module provides:
//! - Image decoding into RGB and grayscale views
//! - Face detection via a Haar cascade
//! - NSFW scoring via pluggable ONNX backends
//!
//! Everything runs on CPU.

pub mod face;
pub mod image_utils;
pub mod model_manager;
pub mod nsfw;

pub use image_utils::{
    decode_base64_image, decode_image_bytes, decode_image_with_hint, detect_format, DecodeLimits,
    DecodedImage, ImageError, ImageInfo,
};
pub use model_manager::{ModelInfo, ModerationModels};
