// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Tensor preparation for the NSFW classifiers

use image::{imageops::FilterType, RgbImage};
use ndarray::Array4;

/// Input size of the ViT label classifier
pub const LABEL_INPUT_SIZE: u32 = 224;

/// ViT normalization (maps [0, 1] to [-1, 1])
pub const LABEL_MEAN: [f32; 3] = [0.5, 0.5, 0.5];
pub const LABEL_STD: [f32; 3] = [0.5, 0.5, 0.5];

/// Input size of the nudity classifier
pub const NUDITY_INPUT_SIZE: u32 = 256;

/// Per-channel BGR means subtracted by the nudity classifier
pub const NUDITY_BGR_MEAN: [f32; 3] = [103.939, 116.779, 123.68];

/// Resize and normalize to an NCHW RGB tensor: (pixel / 255 - mean) / std
pub fn to_nchw_tensor(image: &RgbImage, size: u32, mean: [f32; 3], std: [f32; 3]) -> Array4<f32> {
    let resized = image::imageops::resize(image, size, size, FilterType::Triangle);
    let size = size as usize;
    let mut tensor = Array4::zeros((1, 3, size, size));

    for (x, y, pixel) in resized.enumerate_pixels() {
        for c in 0..3 {
            tensor[[0, c, y as usize, x as usize]] = (pixel[c] as f32 / 255.0 - mean[c]) / std[c];
        }
    }

    tensor
}

/// Resize to an NHWC BGR tensor with channel means subtracted
pub fn to_nhwc_bgr_tensor(image: &RgbImage, size: u32, bgr_mean: [f32; 3]) -> Array4<f32> {
    let resized = image::imageops::resize(image, size, size, FilterType::Triangle);
    let size = size as usize;
    let mut tensor = Array4::zeros((1, size, size, 3));

    for (x, y, pixel) in resized.enumerate_pixels() {
        for c in 0..3 {
            // BGR order
            let value = pixel[2 - c] as f32;
            tensor[[0, y as usize, x as usize, c]] = value - bgr_mean[c];
        }
    }

    tensor
}

/// Numerically stable softmax
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|v| (v - max).exp()).collect();
    let total: f32 = exps.iter().sum();
    exps.iter().map(|v| v / total).collect()
}
