// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod analyze;
pub mod detect_face;
pub mod errors;
pub mod handlers;
pub mod server;
pub mod upload;

pub use analyze::AnalyzeRequest;
pub use errors::{ApiError, ErrorResponse};
pub use handlers::{HealthResponse, StatusResponse};
pub use server::{create_router, start_server, AppState};
