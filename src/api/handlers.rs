// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use tracing::error;

use super::errors::ApiError;
use super::server::AppState;
use crate::moderation::{ModerationError, ModerationPipeline};
use crate::monitoring::ModerationMetrics;
use crate::version;
use crate::vision::ModelInfo;

pub const SERVICE_STATUS: &str = "Face Detection Service Running";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub nsfw_backend: String,
    pub threshold: f32,
    pub models: Vec<ModelInfo>,
}

/// GET /
pub async fn root_handler() -> Json<StatusResponse> {
    Json(StatusResponse {
        status: SERVICE_STATUS.to_string(),
    })
}

/// GET /health
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: version::VERSION.to_string(),
        nsfw_backend: state.models.nsfw_classifier().name().to_string(),
        threshold: state.pipeline.threshold(),
        models: state.models.list_models(),
    })
}

/// GET /metrics
pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4",
        )],
        state.metrics.export_prometheus(),
    )
}

/// Run a pipeline job on the blocking pool under the request timeout
pub(crate) async fn run_blocking<T, F>(state: &AppState, job: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&ModerationPipeline) -> Result<T, ModerationError> + Send + 'static,
{
    let pipeline = state.pipeline.clone();
    let task = tokio::task::spawn_blocking(move || job(&pipeline));

    match tokio::time::timeout(state.request_timeout, task).await {
        Err(_) => Err(ApiError::Timeout),
        Ok(Err(join_error)) => {
            error!("Moderation task failed: {}", join_error);
            Err(ApiError::InternalError(format!(
                "moderation task failed: {}",
                join_error
            )))
        }
        Ok(Ok(result)) => result.map_err(ApiError::from),
    }
}

/// Count a failed request by kind
pub(crate) fn record_failure(metrics: &ModerationMetrics, err: &ApiError) {
    match err {
        ApiError::Timeout => metrics.record_timeout(),
        ApiError::ClassificationFailed(_) | ApiError::InternalError(_) => {
            metrics.record_classification_error()
        }
        _ if err.status_code() < 500 => metrics.record_invalid_image(),
        _ => {}
    }
}
