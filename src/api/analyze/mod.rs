// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Image moderation endpoints
//!
//! Provides POST /analyze (multipart) and POST /v1/analyze (base64 JSON).

pub mod handler;
pub mod request;

pub use handler::{analyze_base64_handler, analyze_handler};
pub use request::AnalyzeRequest;
