// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Summed-area tables over a grayscale image

use image::GrayImage;

/// Integral and squared-integral image with a zero top row and left column
#[derive(Debug, Clone)]
pub struct IntegralImage {
    width: u32,
    height: u32,
    sum: Vec<f64>,
    sq_sum: Vec<f64>,
}

impl IntegralImage {
    pub fn new(gray: &GrayImage) -> Self {
        let (width, height) = gray.dimensions();
        let stride = width as usize + 1;
        let mut sum = vec![0.0f64; stride * (height as usize + 1)];
        let mut sq_sum = vec![0.0f64; stride * (height as usize + 1)];

        for y in 0..height as usize {
            let mut row_sum = 0.0f64;
            let mut row_sq = 0.0f64;
            for x in 0..width as usize {
                let v = gray.get_pixel(x as u32, y as u32).0[0] as f64;
                row_sum += v;
                row_sq += v * v;
                let idx = (y + 1) * stride + x + 1;
                sum[idx] = sum[idx - stride] + row_sum;
                sq_sum[idx] = sq_sum[idx - stride] + row_sq;
            }
        }

        Self {
            width,
            height,
            sum,
            sq_sum,
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Sum of pixel values inside the rectangle
    pub fn sum(&self, x: u32, y: u32, width: u32, height: u32) -> f64 {
        self.rect(&self.sum, x, y, width, height)
    }

    /// Sum of squared pixel values inside the rectangle
    pub fn squared_sum(&self, x: u32, y: u32, width: u32, height: u32) -> f64 {
        self.rect(&self.sq_sum, x, y, width, height)
    }

    fn rect(&self, table: &[f64], x: u32, y: u32, width: u32, height: u32) -> f64 {
        let stride = self.width as usize + 1;
        let (x0, y0) = (x as usize, y as usize);
        let (x1, y1) = (x0 + width as usize, y0 + height as usize);
        table[y1 * stride + x1] - table[y0 * stride + x1] - table[y1 * stride + x0]
            + table[y0 * stride + x0]
    }
}
