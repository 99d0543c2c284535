// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Multi-scale sliding-window face detection

use std::path::Path;

use image::{imageops::FilterType, GrayImage};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use super::cascade::{CascadeError, HaarCascade};
use super::integral::IntegralImage;

/// Relative tolerance used when clustering candidate windows
pub const GROUP_EPS: f64 = 0.2;

/// Errors raised by face detection
#[derive(Debug, Error)]
pub enum DetectionError {
    #[error("Invalid detector configuration: {0}")]
    InvalidConfig(String),

    #[error("Cannot scan an empty image")]
    EmptyImage,

    #[error(transparent)]
    Cascade(#[from] CascadeError),
}

/// Axis-aligned face rectangle in source image pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl FaceRect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSize {
    pub width: u32,
    pub height: u32,
}

impl WindowSize {
    pub fn square(side: u32) -> Self {
        Self {
            width: side,
            height: side,
        }
    }
}

/// Detector tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Per-level image downscale factor, must be > 1.0
    pub scale_factor: f64,
    /// Clusters with this many members or fewer are dropped
    pub min_neighbors: u32,
    /// Smallest window scanned
    pub min_size: WindowSize,
    /// Largest window scanned
    pub max_size: Option<WindowSize>,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            scale_factor: 1.1,
            min_neighbors: 5,
            min_size: WindowSize::square(30),
            max_size: None,
        }
    }
}

impl DetectorConfig {
    pub fn validate(&self) -> Result<(), DetectionError> {
        if !self.scale_factor.is_finite() || self.scale_factor <= 1.0 {
            return Err(DetectionError::InvalidConfig(format!(
                "scale_factor must be greater than 1.0, got {}",
                self.scale_factor
            )));
        }
        if let Some(max) = self.max_size {
            if max.width < self.min_size.width || max.height < self.min_size.height {
                return Err(DetectionError::InvalidConfig(format!(
                    "max_size {}x{} is smaller than min_size {}x{}",
                    max.width, max.height, self.min_size.width, self.min_size.height
                )));
            }
        }
        Ok(())
    }
}

/// Face detection over a grayscale view
pub trait FaceDetector: Send + Sync {
    fn detect(&self, gray: &GrayImage) -> Result<Vec<FaceRect>, DetectionError>;
}

/// Haar cascade detector
///
/// The cascade is immutable after load so one instance serves all requests
/// without locking.
#[derive(Debug, Clone)]
pub struct HaarFaceDetector {
    cascade: HaarCascade,
    config: DetectorConfig,
}

impl HaarFaceDetector {
    pub fn new(cascade: HaarCascade, config: DetectorConfig) -> Result<Self, DetectionError> {
        config.validate()?;
        Ok(Self { cascade, config })
    }

    pub fn from_file(path: impl AsRef<Path>, config: DetectorConfig) -> Result<Self, DetectionError> {
        let cascade = HaarCascade::from_file(path)?;
        Self::new(cascade, config)
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    pub fn cascade(&self) -> &HaarCascade {
        &self.cascade
    }

    /// Every window accepted by the cascade, before grouping
    pub fn candidates(&self, gray: &GrayImage) -> Result<Vec<FaceRect>, DetectionError> {
        let (img_w, img_h) = gray.dimensions();
        if img_w == 0 || img_h == 0 {
            return Err(DetectionError::EmptyImage);
        }

        let (win_w, win_h) = self.cascade.window_size();
        let mut candidates = Vec::new();
        let mut factor = 1.0f64;

        loop {
            let scaled_w = (img_w as f64 / factor).round() as u32;
            let scaled_h = (img_h as f64 / factor).round() as u32;
            if scaled_w < win_w || scaled_h < win_h {
                break;
            }

            let window_w = (win_w as f64 * factor).round() as u32;
            let window_h = (win_h as f64 * factor).round() as u32;

            if let Some(max) = self.config.max_size {
                if window_w > max.width || window_h > max.height {
                    break;
                }
            }

            if window_w >= self.config.min_size.width && window_h >= self.config.min_size.height {
                let integral = if scaled_w == img_w && scaled_h == img_h {
                    IntegralImage::new(gray)
                } else {
                    IntegralImage::new(&image::imageops::resize(
                        gray,
                        scaled_w,
                        scaled_h,
                        FilterType::Triangle,
                    ))
                };

                let step = if factor > 2.0 { 1 } else { 2 };
                for y in (0..=scaled_h - win_h).step_by(step) {
                    for x in (0..=scaled_w - win_w).step_by(step) {
                        if self.cascade.evaluate(&integral, x, y) {
                            candidates.push(FaceRect::new(
                                (x as f64 * factor).round() as u32,
                                (y as f64 * factor).round() as u32,
                                window_w,
                                window_h,
                            ));
                        }
                    }
                }
            }

            factor *= self.config.scale_factor;
        }

        Ok(candidates)
    }
}

impl FaceDetector for HaarFaceDetector {
    fn detect(&self, gray: &GrayImage) -> Result<Vec<FaceRect>, DetectionError> {
        let candidates = self.candidates(gray)?;
        let faces = group_rectangles(&candidates, self.config.min_neighbors, GROUP_EPS);
        debug!(
            "Face scan {}x{}: {} candidates, {} faces",
            gray.width(),
            gray.height(),
            candidates.len(),
            faces.len()
        );
        Ok(faces)
    }
}

fn similar(a: &FaceRect, b: &FaceRect, eps: f64) -> bool {
    let delta = eps
        * (a.width.min(b.width) as f64 + a.height.min(b.height) as f64)
        * 0.5;
    let (ax, ay, aw, ah) = (a.x as f64, a.y as f64, a.width as f64, a.height as f64);
    let (bx, by, bw, bh) = (b.x as f64, b.y as f64, b.width as f64, b.height as f64);

    (ax - bx).abs() <= delta
        && (ay - by).abs() <= delta
        && (ax + aw - bx - bw).abs() <= delta
        && (ay + ah - by - bh).abs() <= delta
}

fn find_root(parent: &mut [usize], mut i: usize) -> usize {
    while parent[i] != i {
        parent[i] = parent[parent[i]];
        i = parent[i];
    }
    i
}

/// Cluster overlapping candidates and keep the well-supported ones
///
/// Clusters with `min_neighbors` members or fewer are dropped, the members of
/// each remaining cluster are averaged, and a cluster that sits inside a
/// stronger one is suppressed. `min_neighbors == 0` returns the input as-is.
pub fn group_rectangles(rects: &[FaceRect], min_neighbors: u32, eps: f64) -> Vec<FaceRect> {
    if min_neighbors == 0 || rects.is_empty() {
        return rects.to_vec();
    }

    let n = rects.len();
    let mut parent: Vec<usize> = (0..n).collect();
    for i in 0..n {
        for j in (i + 1)..n {
            if similar(&rects[i], &rects[j], eps) {
                let (ri, rj) = (find_root(&mut parent, i), find_root(&mut parent, j));
                if ri != rj {
                    parent[rj] = ri;
                }
            }
        }
    }

    // Cluster ids follow first appearance
    let mut cluster_of_root = vec![usize::MAX; n];
    let mut sums: Vec<[f64; 4]> = Vec::new();
    let mut counts: Vec<u32> = Vec::new();
    for (i, r) in rects.iter().enumerate() {
        let root = find_root(&mut parent, i);
        if cluster_of_root[root] == usize::MAX {
            cluster_of_root[root] = sums.len();
            sums.push([0.0; 4]);
            counts.push(0);
        }
        let c = cluster_of_root[root];
        sums[c][0] += r.x as f64;
        sums[c][1] += r.y as f64;
        sums[c][2] += r.width as f64;
        sums[c][3] += r.height as f64;
        counts[c] += 1;
    }

    let averaged: Vec<FaceRect> = sums
        .iter()
        .zip(counts.iter())
        .map(|(s, &count)| {
            let k = count as f64;
            FaceRect::new(
                (s[0] / k).round() as u32,
                (s[1] / k).round() as u32,
                (s[2] / k).round() as u32,
                (s[3] / k).round() as u32,
            )
        })
        .collect();

    let mut grouped = Vec::new();
    for (i, r1) in averaged.iter().enumerate() {
        let n1 = counts[i];
        if n1 <= min_neighbors {
            continue;
        }

        let nested = averaged.iter().enumerate().any(|(j, r2)| {
            let n2 = counts[j];
            if j == i || n2 <= min_neighbors {
                return false;
            }
            let dx = (r2.width as f64 * eps).round();
            let dy = (r2.height as f64 * eps).round();
            let inside = r1.x as f64 >= r2.x as f64 - dx
                && r1.y as f64 >= r2.y as f64 - dy
                && (r1.x + r1.width) as f64 <= (r2.x + r2.width) as f64 + dx
                && (r1.y + r1.height) as f64 <= (r2.y + r2.height) as f64 + dy;
            inside && (n2 > n1.max(3) || n1 < 3)
        });

        if !nested {
            grouped.push(*r1);
        }
    }

    grouped
}
