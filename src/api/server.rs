// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use super::analyze::{analyze_base64_handler, analyze_handler};
use super::detect_face::detect_face_handler;
use super::handlers::{health_handler, metrics_handler, root_handler};
use crate::config::{ModerationConfig, ServerConfig};
use crate::moderation::{ModerationPipeline, VerdictComposer};
use crate::monitoring::ModerationMetrics;
use crate::vision::ModerationModels;

/// Headroom for multipart framing and base64 expansion on top of the image limit
const BODY_OVERHEAD_BYTES: usize = 64 * 1024;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<ModerationPipeline>,
    pub models: Arc<ModerationModels>,
    pub metrics: ModerationMetrics,
    pub request_timeout: Duration,
}

impl AppState {
    pub fn new(models: ModerationModels, config: &ModerationConfig) -> Self {
        let pipeline = ModerationPipeline::from_models(
            &models,
            VerdictComposer::new(config.verdict.threshold),
        )
        .with_max_image_bytes(config.server.max_upload_bytes)
        .with_max_image_pixels(config.server.max_image_pixels);

        Self {
            pipeline: Arc::new(pipeline),
            models: Arc::new(models),
            metrics: ModerationMetrics::new(),
            request_timeout: Duration::from_secs(config.server.request_timeout_secs),
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

/// Largest request body accepted for an image limit
pub fn request_body_limit(max_upload_bytes: usize) -> usize {
    max_upload_bytes / 3 * 4 + BODY_OVERHEAD_BYTES
}

/// CORS policy: `*` allows any origin, otherwise the listed origins only
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin {:?}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(Any)
        .allow_headers(Any)
}

pub fn create_router(state: AppState, config: &ServerConfig) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/analyze", post(analyze_handler))
        .route("/detect-face", post(detect_face_handler))
        .route("/v1/analyze", post(analyze_base64_handler))
        .layer(DefaultBodyLimit::max(request_body_limit(config.max_upload_bytes)))
        .layer(cors_layer(&config.cors_allowed_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve until Ctrl+C
pub async fn start_server(config: &ModerationConfig, state: AppState) -> Result<()> {
    let app = create_router(state, &config.server);

    let listener = tokio::net::TcpListener::bind(&config.server.listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.listen_addr))?;
    info!("🚀 Moderation API listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    info!("✅ Moderation API stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("🛑 Received shutdown signal");
}
