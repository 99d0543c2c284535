// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Face-only detection endpoint
//!
//! Provides POST /detect-face for clients that only need a face count.

pub mod handler;

pub use handler::detect_face_handler;
