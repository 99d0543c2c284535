// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Node configuration
//!
//! Layered as defaults, then an optional TOML file, then CLI flags (each flag
//! also readable from an environment variable).

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use serde::{Deserialize, Serialize};

use crate::moderation::verdict::DEFAULT_UNSAFE_THRESHOLD;
use crate::vision::face::{DetectorConfig, WindowSize};
use crate::vision::image_utils::{MAX_IMAGE_PIXELS, MAX_IMAGE_SIZE};
use crate::vision::nsfw::NsfwBackendKind;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    /// `["*"]` allows any origin
    pub cors_allowed_origins: Vec<String>,
    pub max_upload_bytes: usize,
    /// Largest width x height accepted, read from the image header
    pub max_image_pixels: u64,
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:5001".to_string(),
            cors_allowed_origins: vec!["*".to_string()],
            max_upload_bytes: MAX_IMAGE_SIZE,
            max_image_pixels: MAX_IMAGE_PIXELS,
            request_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerdictConfig {
    /// Scores at or above this are unsafe
    pub threshold: f32,
}

impl Default for VerdictConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_UNSAFE_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NsfwConfig {
    pub backend: NsfwBackendKind,
    pub model_path: PathBuf,
    /// `config.json` with `id2label`, or a labels text file (labels backend)
    pub labels_path: PathBuf,
    /// Where the temp-file backend writes; system temp dir when unset
    pub temp_dir: Option<PathBuf>,
}

impl Default for NsfwConfig {
    fn default() -> Self {
        Self {
            backend: NsfwBackendKind::Labels,
            model_path: PathBuf::from("./models/nsfw-onnx/model.onnx"),
            labels_path: PathBuf::from("./models/nsfw-onnx/config.json"),
            temp_dir: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    pub face_cascade_path: PathBuf,
    /// Hugging Face repo used to fetch model files missing on disk
    pub hub_repo: Option<String>,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            face_cascade_path: PathBuf::from("./models/haarcascade_frontalface_default.xml"),
            hub_repo: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModerationConfig {
    pub server: ServerConfig,
    pub detector: DetectorConfig,
    pub verdict: VerdictConfig,
    pub nsfw: NsfwConfig,
    pub models: ModelsConfig,
}

/// Command-line overrides, each with an environment fallback
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// Address to listen on (e.g. 0.0.0.0:5001)
    #[arg(long, env = "LISTEN_ADDR")]
    pub listen_addr: Option<String>,

    /// Largest accepted image in pixels (width x height)
    #[arg(long, env = "MAX_IMAGE_PIXELS")]
    pub max_image_pixels: Option<u64>,

    /// Unsafe score threshold in (0, 1]
    #[arg(long, env = "UNSAFE_THRESHOLD")]
    pub threshold: Option<f32>,

    /// Face detector pyramid scale factor
    #[arg(long, env = "FACE_SCALE_FACTOR")]
    pub scale_factor: Option<f64>,

    /// Face detector neighbor threshold
    #[arg(long, env = "FACE_MIN_NEIGHBORS")]
    pub min_neighbors: Option<u32>,

    /// Smallest face side in pixels
    #[arg(long, env = "FACE_MIN_SIZE")]
    pub min_face_size: Option<u32>,

    /// Path to the Haar cascade XML
    #[arg(long, env = "FACE_CASCADE_PATH")]
    pub face_cascade_path: Option<PathBuf>,

    /// NSFW backend
    #[arg(long, env = "NSFW_BACKEND", value_enum)]
    pub nsfw_backend: Option<NsfwBackendKind>,

    /// Path to the NSFW ONNX model
    #[arg(long, env = "NSFW_MODEL_PATH")]
    pub nsfw_model_path: Option<PathBuf>,

    /// Path to the NSFW labels (config.json or text file)
    #[arg(long, env = "NSFW_LABELS_PATH")]
    pub nsfw_labels_path: Option<PathBuf>,

    /// Directory for temporary classifier inputs
    #[arg(long, env = "MODERATION_TEMP_DIR")]
    pub temp_dir: Option<PathBuf>,

    /// Hugging Face repo to fetch missing model files from
    #[arg(long, env = "MODEL_HUB_REPO")]
    pub hub_repo: Option<String>,
}

impl ModerationConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("Invalid config file {}", path.display()))
    }

    /// Defaults, optional file, then overrides; the result is validated
    pub fn load(path: Option<&Path>, overrides: &ConfigOverrides) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(overrides);
        config.validate()?;
        Ok(config)
    }

    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(addr) = &overrides.listen_addr {
            self.server.listen_addr = addr.clone();
        }
        if let Some(pixels) = overrides.max_image_pixels {
            self.server.max_image_pixels = pixels;
        }
        if let Some(threshold) = overrides.threshold {
            self.verdict.threshold = threshold;
        }
        if let Some(scale) = overrides.scale_factor {
            self.detector.scale_factor = scale;
        }
        if let Some(neighbors) = overrides.min_neighbors {
            self.detector.min_neighbors = neighbors;
        }
        if let Some(side) = overrides.min_face_size {
            self.detector.min_size = WindowSize::square(side);
        }
        if let Some(path) = &overrides.face_cascade_path {
            self.models.face_cascade_path = path.clone();
        }
        if let Some(backend) = overrides.nsfw_backend {
            self.nsfw.backend = backend;
        }
        if let Some(path) = &overrides.nsfw_model_path {
            self.nsfw.model_path = path.clone();
        }
        if let Some(path) = &overrides.nsfw_labels_path {
            self.nsfw.labels_path = path.clone();
        }
        if let Some(dir) = &overrides.temp_dir {
            self.nsfw.temp_dir = Some(dir.clone());
        }
        if let Some(repo) = &overrides.hub_repo {
            self.models.hub_repo = Some(repo.clone());
        }
    }

    pub fn validate(&self) -> Result<()> {
        let threshold = self.verdict.threshold;
        if !(threshold > 0.0 && threshold <= 1.0) {
            anyhow::bail!("verdict.threshold must be in (0, 1], got {}", threshold);
        }

        self.detector
            .validate()
            .context("Invalid [detector] configuration")?;

        if self.server.max_upload_bytes == 0 {
            anyhow::bail!("server.max_upload_bytes must be greater than 0");
        }
        if self.server.max_image_pixels == 0 {
            anyhow::bail!("server.max_image_pixels must be greater than 0");
        }
        if self.server.request_timeout_secs == 0 {
            anyhow::bail!("server.request_timeout_secs must be greater than 0");
        }
        if self.server.cors_allowed_origins.is_empty() {
            anyhow::bail!("server.cors_allowed_origins must not be empty (use [\"*\"] to allow any)");
        }

        Ok(())
    }
}
