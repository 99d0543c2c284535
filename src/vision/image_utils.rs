// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Image decoding for the moderation pipeline
//!
//! Turns raw uploaded bytes into a [`DecodedImage`]: the RGB buffer used by the
//! NSFW classifier plus the grayscale view scanned by the face detector.

use std::io::Cursor;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{DynamicImage, GrayImage, ImageFormat, ImageReader, Limits, RgbImage};
use thiserror::Error;
use tracing::debug;

/// Default maximum upload size (10MB)
pub const MAX_IMAGE_SIZE: usize = 10 * 1024 * 1024;

/// Default maximum decoded image size (40 megapixels)
pub const MAX_IMAGE_PIXELS: u64 = 40_000_000;

/// Bounds applied before an upload is decoded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeLimits {
    /// Largest encoded payload in bytes
    pub max_bytes: usize,
    /// Largest width x height declared by the image header
    pub max_pixels: u64,
}

impl Default for DecodeLimits {
    fn default() -> Self {
        Self {
            max_bytes: MAX_IMAGE_SIZE,
            max_pixels: MAX_IMAGE_PIXELS,
        }
    }
}

/// Custom error types for image decoding
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("Image data is too large: {0} bytes (max: {1} bytes)")]
    TooLarge(usize, usize),

    #[error("Image is {0}x{1} pixels (max: {2} pixels)")]
    TooManyPixels(u32, u32, u64),

    #[error("Invalid base64 encoding: {0}")]
    InvalidBase64(#[from] base64::DecodeError),

    #[error("Unsupported image format")]
    UnsupportedFormat,

    #[error("Failed to decode image: {0}")]
    DecodeFailed(String),

    #[error("Image data is empty")]
    EmptyData,

    #[error("Image has zero width or height")]
    EmptyImage,
}

/// Image information extracted during loading
#[derive(Debug, Clone)]
pub struct ImageInfo {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Detected format
    pub format: ImageFormat,
    /// Size in bytes of the encoded payload
    pub size_bytes: usize,
}

/// A decoded upload, owned by a single request
///
/// `gray` is derived from `rgb` with luminance weighting and is only read by
/// the face detector.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub rgb: RgbImage,
    pub gray: GrayImage,
    pub info: ImageInfo,
}

impl DecodedImage {
    /// Build from an already decoded image
    pub fn from_dynamic(image: DynamicImage, format: ImageFormat, size_bytes: usize) -> Self {
        let rgb = image.to_rgb8();
        let gray = image::imageops::grayscale(&rgb);
        let info = ImageInfo {
            width: rgb.width(),
            height: rgb.height(),
            format,
            size_bytes,
        };

        Self { rgb, gray, info }
    }

    /// Build directly from an RGB buffer (no encoded payload)
    pub fn from_rgb(rgb: RgbImage) -> Self {
        Self::from_dynamic(DynamicImage::ImageRgb8(rgb), ImageFormat::Png, 0)
    }

    pub fn width(&self) -> u32 {
        self.info.width
    }

    pub fn height(&self) -> u32 {
        self.info.height
    }
}

/// Decode raw image bytes with the default limits
pub fn decode_image_bytes(bytes: &[u8]) -> Result<DecodedImage, ImageError> {
    decode_image_with_hint(bytes, None, DecodeLimits::default())
}

/// Decode raw image bytes (multipart uploads)
///
/// # Arguments
/// * `bytes` - Raw image bytes
/// * `content_type` - Optional MIME type sent with the upload
/// * `limits` - Maximum payload size and pixel count
///
/// The format is always taken from the magic bytes; the content type is only
/// compared against it for diagnostics. The pixel limit is checked against the
/// header before any pixel buffer is allocated.
pub fn decode_image_with_hint(
    bytes: &[u8],
    content_type: Option<&str>,
    limits: DecodeLimits,
) -> Result<DecodedImage, ImageError> {
    if bytes.is_empty() {
        return Err(ImageError::EmptyData);
    }

    if bytes.len() > limits.max_bytes {
        return Err(ImageError::TooLarge(bytes.len(), limits.max_bytes));
    }

    let format = detect_format(bytes)?;

    if let Some(hinted) = content_type.and_then(format_from_content_type) {
        if hinted != format {
            debug!(
                "Content type {:?} disagrees with detected format {:?}, using detected format",
                content_type, format
            );
        }
    }

    let (width, height) = ImageReader::with_format(Cursor::new(bytes), format)
        .into_dimensions()
        .map_err(|e| ImageError::DecodeFailed(e.to_string()))?;

    if width as u64 * height as u64 > limits.max_pixels {
        return Err(ImageError::TooManyPixels(width, height, limits.max_pixels));
    }

    let mut reader = ImageReader::with_format(Cursor::new(bytes), format);
    let mut reader_limits = Limits::default();
    reader_limits.max_image_width = Some(width);
    reader_limits.max_image_height = Some(height);
    reader.limits(reader_limits);

    let img = reader
        .decode()
        .map_err(|e| ImageError::DecodeFailed(e.to_string()))?;

    if img.width() == 0 || img.height() == 0 {
        return Err(ImageError::EmptyImage);
    }

    let decoded = DecodedImage::from_dynamic(img, format, bytes.len());
    debug!(
        "Decoded image: {}x{} {:?}, {} bytes",
        decoded.info.width, decoded.info.height, decoded.info.format, decoded.info.size_bytes
    );

    Ok(decoded)
}

/// Decode a base64-encoded image
///
/// # Example
/// ```ignore
/// let image = decode_base64_image("iVBORw0KGgo...", Some("image/png"), DecodeLimits::default())?;
/// println!("Image size: {}x{}", image.width(), image.height());
/// ```
pub fn decode_base64_image(
    base64_str: &str,
    content_type: Option<&str>,
    limits: DecodeLimits,
) -> Result<DecodedImage, ImageError> {
    if base64_str.is_empty() {
        return Err(ImageError::EmptyData);
    }

    // Browsers often send a data URL; only the payload after the comma is base64
    let payload = match base64_str.split_once(',') {
        Some((prefix, data)) if prefix.starts_with("data:") => data,
        _ => base64_str,
    };

    let bytes = STANDARD.decode(payload.trim())?;
    decode_image_with_hint(&bytes, content_type, limits)
}

/// Detect image format from magic bytes
///
/// Common upload formats are matched directly; anything else is handed to
/// `image::guess_format`.
pub fn detect_format(bytes: &[u8]) -> Result<ImageFormat, ImageError> {
    if bytes.len() < 4 {
        return Err(ImageError::UnsupportedFormat);
    }

    match bytes {
        // PNG: 89 50 4E 47 (0x89 P N G)
        [0x89, 0x50, 0x4E, 0x47, ..] => Ok(ImageFormat::Png),

        // JPEG: FF D8 FF
        [0xFF, 0xD8, 0xFF, ..] => Ok(ImageFormat::Jpeg),

        // WebP: RIFF .... WEBP
        [0x52, 0x49, 0x46, 0x46, _, _, _, _, 0x57, 0x45, 0x42, 0x50, ..] => Ok(ImageFormat::WebP),

        // GIF: GIF87a or GIF89a
        [0x47, 0x49, 0x46, 0x38, x, ..] if *x == 0x37 || *x == 0x39 => Ok(ImageFormat::Gif),

        // BMP: BM
        [0x42, 0x4D, ..] => Ok(ImageFormat::Bmp),

        // TIFF: II (little-endian) or MM (big-endian)
        [0x49, 0x49, 0x2A, 0x00, ..] | [0x4D, 0x4D, 0x00, 0x2A, ..] => Ok(ImageFormat::Tiff),

        _ => image::guess_format(bytes).map_err(|_| ImageError::UnsupportedFormat),
    }
}

/// Map an upload content type to an image format
pub fn format_from_content_type(content_type: &str) -> Option<ImageFormat> {
    let mime = content_type.split(';').next()?.trim().to_ascii_lowercase();
    match mime.as_str() {
        "image/png" => Some(ImageFormat::Png),
        "image/jpeg" | "image/jpg" => Some(ImageFormat::Jpeg),
        "image/webp" => Some(ImageFormat::WebP),
        "image/gif" => Some(ImageFormat::Gif),
        "image/bmp" => Some(ImageFormat::Bmp),
        "image/tiff" => Some(ImageFormat::Tiff),
        _ => None,
    }
}
