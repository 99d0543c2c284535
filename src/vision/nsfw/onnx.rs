// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! ONNX Runtime classifiers backing the NSFW backends
//!
//! Both run on CPU. Sessions are not assumed reentrant, so each one sits
//! behind a mutex.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use image::RgbImage;
use ndarray::Array4;
use ort::execution_providers::CPUExecutionProvider;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Value;
use tracing::{debug, info};

use super::label_scores::LabelClassifier;
use super::preprocessing::{
    softmax, to_nchw_tensor, to_nhwc_bgr_tensor, LABEL_INPUT_SIZE, LABEL_MEAN, LABEL_STD,
    NUDITY_BGR_MEAN, NUDITY_INPUT_SIZE,
};
use super::temp_file::PathClassifier;
use super::ClassificationError;

/// Output order of the nudity classifier
pub const NUDITY_LABELS: [&str; 2] = ["unsafe", "safe"];

fn build_session(model_path: &Path) -> Result<Session> {
    if !model_path.exists() {
        anyhow::bail!("NSFW model not found: {}", model_path.display());
    }

    Session::builder()
        .context("Failed to create session builder")?
        .with_execution_providers([CPUExecutionProvider::default().build()])
        .context("Failed to set CPU execution provider")?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .context("Failed to set optimization level")?
        .with_intra_threads(4)
        .context("Failed to set intra threads")?
        .commit_from_file(model_path)
        .context(format!("Failed to load NSFW model from {}", model_path.display()))
}

fn input_name(session: &Session, fallback: &str) -> String {
    session
        .inputs
        .first()
        .map(|input| input.name.clone())
        .unwrap_or_else(|| fallback.to_string())
}

fn inference_error(e: impl std::fmt::Display) -> ClassificationError {
    ClassificationError::Inference(e.to_string())
}

/// Run a single-input session and flatten the first output
fn run_session(
    session: &Mutex<Session>,
    input_name: &str,
    input: Array4<f32>,
) -> Result<Vec<f32>, ClassificationError> {
    let mut session = session
        .lock()
        .map_err(|_| ClassificationError::Inference("session lock poisoned".to_string()))?;

    let input_value = Value::from_array(input).map_err(inference_error)?;
    let outputs = session
        .run(ort::inputs![input_name => input_value])
        .map_err(inference_error)?;

    let output = outputs[0].try_extract_array::<f32>().map_err(inference_error)?;
    Ok(output.iter().copied().collect())
}

/// Read class labels from a Hugging Face `config.json` (`id2label`) or a
/// newline separated text file
pub fn load_labels(path: impl AsRef<Path>) -> Result<Vec<String>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read labels from {}", path.display()))?;

    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if !is_json {
        let labels: Vec<String> = content
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect();
        if labels.is_empty() {
            anyhow::bail!("Labels file {} is empty", path.display());
        }
        return Ok(labels);
    }

    let config: serde_json::Value = serde_json::from_str(&content)
        .with_context(|| format!("Invalid JSON in {}", path.display()))?;
    let id2label = config
        .get("id2label")
        .and_then(|v| v.as_object())
        .with_context(|| format!("{} has no id2label map", path.display()))?;

    let mut entries = id2label
        .iter()
        .map(|(id, label)| {
            let id: usize = id
                .parse()
                .with_context(|| format!("Invalid label id '{}'", id))?;
            let label = label
                .as_str()
                .with_context(|| format!("Label {} is not a string", id))?;
            Ok((id, label.to_string()))
        })
        .collect::<Result<Vec<_>>>()?;
    entries.sort_by_key(|(id, _)| *id);

    for (expected, (id, _)) in entries.iter().enumerate() {
        if *id != expected {
            anyhow::bail!("id2label in {} is not contiguous from 0", path.display());
        }
    }

    Ok(entries.into_iter().map(|(_, label)| label).collect())
}

/// ViT-style multi-label image classifier
#[derive(Clone)]
pub struct OnnxImageClassifier {
    session: Arc<Mutex<Session>>,
    input_name: String,
    labels: Vec<String>,
}

impl std::fmt::Debug for OnnxImageClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxImageClassifier")
            .field("input_name", &self.input_name)
            .field("labels", &self.labels)
            .finish_non_exhaustive()
    }
}

impl OnnxImageClassifier {
    pub fn new(model_path: impl AsRef<Path>, labels_path: impl AsRef<Path>) -> Result<Self> {
        let model_path = model_path.as_ref();
        let labels = load_labels(labels_path)?;

        info!("Loading NSFW label classifier from {}", model_path.display());
        let session = build_session(model_path)?;
        let input_name = input_name(&session, "pixel_values");

        info!(
            "✅ NSFW label classifier loaded (CPU-only, labels: {:?})",
            labels
        );

        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            input_name,
            labels,
        })
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }
}

impl LabelClassifier for OnnxImageClassifier {
    fn classify(&self, image: &RgbImage) -> Result<Vec<(String, f32)>, ClassificationError> {
        let input = to_nchw_tensor(image, LABEL_INPUT_SIZE, LABEL_MEAN, LABEL_STD);
        let logits = run_session(&self.session, &self.input_name, input)?;

        if logits.len() != self.labels.len() {
            return Err(ClassificationError::Inference(format!(
                "model produced {} logits for {} labels",
                logits.len(),
                self.labels.len()
            )));
        }

        let mut predictions: Vec<(String, f32)> = self
            .labels
            .iter()
            .cloned()
            .zip(softmax(&logits))
            .collect();
        predictions.sort_by(|a, b| b.1.total_cmp(&a.1));

        Ok(predictions)
    }
}

/// NudeNet-style two-class classifier reading images from disk
#[derive(Clone)]
pub struct OnnxNudityClassifier {
    session: Arc<Mutex<Session>>,
    input_name: String,
}

impl std::fmt::Debug for OnnxNudityClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxNudityClassifier")
            .field("input_name", &self.input_name)
            .finish_non_exhaustive()
    }
}

impl OnnxNudityClassifier {
    pub fn new(model_path: impl AsRef<Path>) -> Result<Self> {
        let model_path = model_path.as_ref();

        info!("Loading NSFW nudity classifier from {}", model_path.display());
        let session = build_session(model_path)?;
        let input_name = input_name(&session, "input_1");

        info!("✅ NSFW nudity classifier loaded (CPU-only)");

        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            input_name,
        })
    }
}

impl PathClassifier for OnnxNudityClassifier {
    fn classify_path(&self, path: &Path) -> Result<HashMap<String, f32>, ClassificationError> {
        let image = image::open(path)
            .map_err(|e| ClassificationError::Encode(format!("{}: {}", path.display(), e)))?
            .to_rgb8();

        let input = to_nhwc_bgr_tensor(&image, NUDITY_INPUT_SIZE, NUDITY_BGR_MEAN);
        let probs = run_session(&self.session, &self.input_name, input)?;

        if probs.len() != NUDITY_LABELS.len() {
            return Err(ClassificationError::Inference(format!(
                "nudity model produced {} outputs, expected {}",
                probs.len(),
                NUDITY_LABELS.len()
            )));
        }
        debug!("Nudity probabilities: unsafe={:.4} safe={:.4}", probs[0], probs[1]);

        Ok(NUDITY_LABELS
            .iter()
            .map(|l| l.to_string())
            .zip(probs)
            .collect())
    }
}
