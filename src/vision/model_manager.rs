// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Moderation model manager
//!
//! Loads the face cascade and the configured NSFW backend once at startup.
//! The resulting handle is shared read-only by every request.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use serde::Serialize;

use crate::config::ModerationConfig;
use crate::moderation::ModerationError;
use crate::vision::face::{FaceDetector, HaarFaceDetector};
use crate::vision::nsfw::{
    LabelScoreNsfwBackend, NsfwBackendKind, NsfwClassifier, OnnxImageClassifier,
    OnnxNudityClassifier, TempFileNsfwBackend,
};

/// Information about a loaded model
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelInfo {
    /// Model name
    pub name: String,
    /// Model type (face, nsfw)
    pub model_type: String,
    /// Source the model was loaded from
    pub source: String,
}

/// Loaded moderation models
#[derive(Clone)]
pub struct ModerationModels {
    face_detector: Arc<dyn FaceDetector>,
    nsfw_classifier: Arc<dyn NsfwClassifier>,
    models: Vec<ModelInfo>,
}

impl std::fmt::Debug for ModerationModels {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModerationModels")
            .field("models", &self.models)
            .finish_non_exhaustive()
    }
}

impl ModerationModels {
    /// Wrap already constructed models
    pub fn new(face_detector: Arc<dyn FaceDetector>, nsfw_classifier: Arc<dyn NsfwClassifier>) -> Self {
        let models = vec![
            ModelInfo {
                name: "face-detector".to_string(),
                model_type: "face".to_string(),
                source: "in-memory".to_string(),
            },
            ModelInfo {
                name: nsfw_classifier.name().to_string(),
                model_type: "nsfw".to_string(),
                source: "in-memory".to_string(),
            },
        ];

        Self {
            face_detector,
            nsfw_classifier,
            models,
        }
    }

    /// Load every model named by the configuration
    ///
    /// Any failure is a [`ModerationError::ModelLoad`]; the node must not
    /// serve without both models.
    pub async fn load(config: &ModerationConfig) -> Result<Self, ModerationError> {
        let hub_repo = config.models.hub_repo.as_deref();

        let cascade_path = resolve_model_file(&config.models.face_cascade_path, hub_repo).await?;
        let nsfw_model_path = resolve_model_file(&config.nsfw.model_path, hub_repo).await?;
        let labels_path = match config.nsfw.backend {
            NsfwBackendKind::Labels => Some(resolve_model_file(&config.nsfw.labels_path, hub_repo).await?),
            NsfwBackendKind::TempFile => None,
        };

        let detector_config = config.detector.clone();
        let nsfw_config = config.nsfw.clone();

        let loaded = tokio::task::spawn_blocking(move || -> anyhow::Result<Self> {
            let face_detector = HaarFaceDetector::from_file(&cascade_path, detector_config)
                .with_context(|| format!("Failed to load face cascade {}", cascade_path.display()))?;
            tracing::info!(
                "✅ Face cascade loaded from {} ({} stages)",
                cascade_path.display(),
                face_detector.cascade().stage_count()
            );

            let nsfw_classifier: Arc<dyn NsfwClassifier> = match (nsfw_config.backend, labels_path) {
                (NsfwBackendKind::Labels, Some(labels_path)) => {
                    let classifier = OnnxImageClassifier::new(&nsfw_model_path, &labels_path)?;
                    Arc::new(LabelScoreNsfwBackend::new(classifier))
                }
                _ => {
                    let classifier = OnnxNudityClassifier::new(&nsfw_model_path)?;
                    let backend = TempFileNsfwBackend::new(classifier);
                    let backend = match nsfw_config.temp_dir {
                        Some(dir) => backend.with_temp_dir(dir),
                        None => backend,
                    };
                    Arc::new(backend)
                }
            };
            tracing::info!(
                "✅ NSFW {} backend loaded from {}",
                nsfw_classifier.name(),
                nsfw_model_path.display()
            );

            let models = vec![
                ModelInfo {
                    name: file_name(&cascade_path),
                    model_type: "face".to_string(),
                    source: cascade_path.display().to_string(),
                },
                ModelInfo {
                    name: file_name(&nsfw_model_path),
                    model_type: format!("nsfw/{}", nsfw_classifier.name()),
                    source: nsfw_model_path.display().to_string(),
                },
            ];

            Ok(Self {
                face_detector: Arc::new(face_detector),
                nsfw_classifier,
                models,
            })
        })
        .await
        .map_err(|e| ModerationError::ModelLoad(format!("model loading task failed: {}", e)))?;

        loaded.map_err(|e| ModerationError::ModelLoad(format!("{:#}", e)))
    }

    pub fn face_detector(&self) -> Arc<dyn FaceDetector> {
        self.face_detector.clone()
    }

    pub fn nsfw_classifier(&self) -> Arc<dyn NsfwClassifier> {
        self.nsfw_classifier.clone()
    }

    /// List all loaded models
    pub fn list_models(&self) -> Vec<ModelInfo> {
        self.models.clone()
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Return `path` when present, otherwise fetch its file name from the
/// configured Hugging Face repo
pub async fn resolve_model_file(path: &Path, hub_repo: Option<&str>) -> Result<PathBuf, ModerationError> {
    if path.exists() {
        return Ok(path.to_path_buf());
    }

    let Some(repo) = hub_repo else {
        return Err(ModerationError::ModelLoad(format!(
            "model file not found: {}",
            path.display()
        )));
    };

    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| ModerationError::ModelLoad(format!("invalid model path: {}", path.display())))?;

    tracing::info!("📥 Fetching {} from Hugging Face repo {}", filename, repo);
    let api = hf_hub::api::tokio::Api::new()
        .map_err(|e| ModerationError::ModelLoad(format!("Hugging Face client: {}", e)))?;
    let fetched = api
        .model(repo.to_string())
        .get(filename)
        .await
        .map_err(|e| ModerationError::ModelLoad(format!("failed to fetch {} from {}: {}", filename, repo, e)))?;

    tracing::info!("✅ Fetched {} to {}", filename, fetched.display());
    Ok(fetched)
}
