// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Haar cascade model and OpenCV cascade XML loader
//!
//! Only the current OpenCV layout is understood (`<stages>` / `<features>`,
//! `stageType BOOST`, `featureType HAAR`). Tilted features and LBP cascades
//! are rejected at load time.

use std::path::Path;

use regex::Regex;
use thiserror::Error;
use tracing::debug;

use super::integral::IntegralImage;

/// Errors raised while loading a cascade
#[derive(Debug, Error)]
pub enum CascadeError {
    #[error("Failed to read cascade file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed cascade: {0}")]
    Malformed(String),

    #[error("Unsupported cascade: {0}")]
    Unsupported(String),
}

/// One weighted rectangle of a Haar feature, in window coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HaarRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub weight: f32,
}

impl HaarRect {
    pub fn new(x: u32, y: u32, width: u32, height: u32, weight: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            weight,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HaarFeature {
    pub rects: Vec<HaarRect>,
}

impl HaarFeature {
    pub fn new(rects: Vec<HaarRect>) -> Self {
        Self { rects }
    }

    /// Weighted rectangle sum for the window whose top-left corner is (x, y)
    fn raw_value(&self, integral: &IntegralImage, x: u32, y: u32) -> f64 {
        self.rects
            .iter()
            .map(|r| r.weight as f64 * integral.sum(x + r.x, y + r.y, r.width, r.height))
            .sum()
    }
}

/// Split node of a weak classifier tree
///
/// `left`/`right` greater than zero index another node of the same tree;
/// zero or below is a leaf, `leaves[-child]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TreeNode {
    pub left: i32,
    pub right: i32,
    pub feature: usize,
    pub threshold: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WeakClassifier {
    pub nodes: Vec<TreeNode>,
    pub leaves: Vec<f32>,
}

impl WeakClassifier {
    /// Single-split tree
    pub fn stump(feature: usize, threshold: f32, below: f32, above: f32) -> Self {
        Self {
            nodes: vec![TreeNode {
                left: 0,
                right: -1,
                feature,
                threshold,
            }],
            leaves: vec![below, above],
        }
    }

    fn evaluate(&self, features: &[HaarFeature], integral: &IntegralImage, x: u32, y: u32, norm: f64) -> f64 {
        let mut idx: i32 = 0;
        loop {
            let node = &self.nodes[idx as usize];
            let value = features[node.feature].raw_value(integral, x, y) / norm;
            idx = if value < node.threshold as f64 {
                node.left
            } else {
                node.right
            };
            if idx <= 0 {
                break;
            }
        }
        self.leaves[(-idx) as usize] as f64
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stage {
    pub threshold: f32,
    pub classifiers: Vec<WeakClassifier>,
}

/// A boosted cascade of Haar feature trees
#[derive(Debug, Clone, PartialEq)]
pub struct HaarCascade {
    window_width: u32,
    window_height: u32,
    stages: Vec<Stage>,
    features: Vec<HaarFeature>,
}

impl HaarCascade {
    /// Build a cascade from parts, validating every index and rectangle
    pub fn new(
        window_width: u32,
        window_height: u32,
        stages: Vec<Stage>,
        features: Vec<HaarFeature>,
    ) -> Result<Self, CascadeError> {
        if window_width < 3 || window_height < 3 {
            return Err(CascadeError::Malformed(format!(
                "window {}x{} is too small",
                window_width, window_height
            )));
        }
        if stages.is_empty() {
            return Err(CascadeError::Malformed("cascade has no stages".to_string()));
        }

        for (f_idx, feature) in features.iter().enumerate() {
            if feature.rects.is_empty() {
                return Err(CascadeError::Malformed(format!("feature {} has no rects", f_idx)));
            }
            for r in &feature.rects {
                if r.x + r.width > window_width || r.y + r.height > window_height {
                    return Err(CascadeError::Malformed(format!(
                        "feature {} rect ({}, {}, {}, {}) exceeds the {}x{} window",
                        f_idx, r.x, r.y, r.width, r.height, window_width, window_height
                    )));
                }
            }
        }

        for (s_idx, stage) in stages.iter().enumerate() {
            if stage.classifiers.is_empty() {
                return Err(CascadeError::Malformed(format!("stage {} has no classifiers", s_idx)));
            }
            for weak in &stage.classifiers {
                validate_tree(weak, features.len())
                    .map_err(|msg| CascadeError::Malformed(format!("stage {}: {}", s_idx, msg)))?;
            }
        }

        Ok(Self {
            window_width,
            window_height,
            stages,
            features,
        })
    }

    /// Load an OpenCV cascade XML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, CascadeError> {
        let path = path.as_ref();
        let xml = std::fs::read_to_string(path)?;
        let cascade = Self::from_xml_str(&xml)?;
        debug!(
            "Loaded cascade {} ({} stages, {} features, {}x{} window)",
            path.display(),
            cascade.stages.len(),
            cascade.features.len(),
            cascade.window_width,
            cascade.window_height
        );
        Ok(cascade)
    }

    /// Parse the OpenCV cascade XML layout
    pub fn from_xml_str(xml: &str) -> Result<Self, CascadeError> {
        let xml = Regex::new(r"(?s)<!--.*?-->")
            .map_err(regex_error)?
            .replace_all(xml, "");

        if let Some(kind) = tag_text(&xml, "stageType")? {
            if kind != "BOOST" {
                return Err(CascadeError::Unsupported(format!("stage type {}", kind)));
            }
        }
        if let Some(kind) = tag_text(&xml, "featureType")? {
            if kind != "HAAR" {
                return Err(CascadeError::Unsupported(format!("feature type {}", kind)));
            }
        }

        let stages_xml = section(&xml, "stages").ok_or_else(|| {
            CascadeError::Unsupported("missing <stages> section (old-style cascades are not supported)".to_string())
        })?;
        let features_xml = section(&xml, "features")
            .ok_or_else(|| CascadeError::Malformed("missing <features> section".to_string()))?;

        let width = parse_number::<u32>(&required_tag(&xml, "width")?, "width")?;
        let height = parse_number::<u32>(&required_tag(&xml, "height")?, "height")?;

        let stages = parse_stages(stages_xml)?;
        let features = parse_features(features_xml)?;

        Self::new(width, height, stages, features)
    }

    pub fn window_size(&self) -> (u32, u32) {
        (self.window_width, self.window_height)
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    pub fn feature_count(&self) -> usize {
        self.features.len()
    }

    /// Run every stage on the window at (x, y) of the integral image
    ///
    /// The caller guarantees the window fits inside the integral image.
    pub fn evaluate(&self, integral: &IntegralImage, x: u32, y: u32) -> bool {
        let (nw, nh) = (self.window_width - 2, self.window_height - 2);
        let area = (nw as f64) * (nh as f64);
        let sum = integral.sum(x + 1, y + 1, nw, nh);
        let sq_sum = integral.squared_sum(x + 1, y + 1, nw, nh);

        let variance = area * sq_sum - sum * sum;
        let norm = if variance > 0.0 { variance.sqrt() } else { 1.0 };

        self.stages.iter().all(|stage| {
            let total: f64 = stage
                .classifiers
                .iter()
                .map(|weak| weak.evaluate(&self.features, integral, x, y, norm))
                .sum();
            total >= stage.threshold as f64
        })
    }
}

fn validate_tree(weak: &WeakClassifier, feature_count: usize) -> Result<(), String> {
    if weak.nodes.is_empty() {
        return Err("weak classifier has no nodes".to_string());
    }
    for node in &weak.nodes {
        if node.feature >= feature_count {
            return Err(format!(
                "feature index {} out of range ({} features)",
                node.feature, feature_count
            ));
        }
        for child in [node.left, node.right] {
            let in_range = if child > 0 {
                (child as usize) < weak.nodes.len()
            } else {
                (child.unsigned_abs() as usize) < weak.leaves.len()
            };
            if !in_range {
                return Err(format!("tree child {} out of range", child));
            }
        }
    }
    Ok(())
}

fn parse_stages(stages_xml: &str) -> Result<Vec<Stage>, CascadeError> {
    let threshold_re = Regex::new(r"<stageThreshold>\s*([^<]+?)\s*</stageThreshold>").map_err(regex_error)?;
    let nodes_re = Regex::new(r"<internalNodes>([^<]*)</internalNodes>").map_err(regex_error)?;
    let leaves_re = Regex::new(r"<leafValues>([^<]*)</leafValues>").map_err(regex_error)?;

    let marks: Vec<(usize, String)> = threshold_re
        .captures_iter(stages_xml)
        .filter_map(|c| Some((c.get(0)?.start(), c.get(1)?.as_str().to_string())))
        .collect();

    if marks.is_empty() {
        return Err(CascadeError::Malformed("no <stageThreshold> found".to_string()));
    }

    let mut stages = Vec::with_capacity(marks.len());
    for (i, (start, threshold)) in marks.iter().enumerate() {
        let end = marks.get(i + 1).map(|(s, _)| *s).unwrap_or(stages_xml.len());
        let body = &stages_xml[*start..end];

        let nodes: Vec<&str> = nodes_re
            .captures_iter(body)
            .filter_map(|c| c.get(1).map(|m| m.as_str()))
            .collect();
        let leaves: Vec<&str> = leaves_re
            .captures_iter(body)
            .filter_map(|c| c.get(1).map(|m| m.as_str()))
            .collect();

        if nodes.len() != leaves.len() {
            return Err(CascadeError::Malformed(format!(
                "stage {} has {} internalNodes but {} leafValues",
                i,
                nodes.len(),
                leaves.len()
            )));
        }

        let classifiers = nodes
            .iter()
            .zip(leaves.iter())
            .map(|(n, l)| parse_weak_classifier(n, l))
            .collect::<Result<Vec<_>, _>>()?;

        stages.push(Stage {
            threshold: parse_number::<f32>(threshold, "stageThreshold")?,
            classifiers,
        });
    }

    Ok(stages)
}

fn parse_weak_classifier(nodes: &str, leaves: &str) -> Result<WeakClassifier, CascadeError> {
    let values: Vec<&str> = nodes.split_whitespace().collect();
    if values.is_empty() || values.len() % 4 != 0 {
        return Err(CascadeError::Malformed(format!(
            "internalNodes must hold groups of 4 values, got {}",
            values.len()
        )));
    }

    let nodes = values
        .chunks(4)
        .map(|chunk| {
            Ok(TreeNode {
                left: parse_number(chunk[0], "node left")?,
                right: parse_number(chunk[1], "node right")?,
                feature: parse_number(chunk[2], "node feature")?,
                threshold: parse_number(chunk[3], "node threshold")?,
            })
        })
        .collect::<Result<Vec<_>, CascadeError>>()?;

    let leaves = leaves
        .split_whitespace()
        .map(|v| parse_number::<f32>(v, "leaf value"))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(WeakClassifier { nodes, leaves })
}

fn parse_features(features_xml: &str) -> Result<Vec<HaarFeature>, CascadeError> {
    let tilted_re = Regex::new(r"<tilted>\s*1\s*</tilted>").map_err(regex_error)?;
    if tilted_re.is_match(features_xml) {
        return Err(CascadeError::Unsupported("tilted features".to_string()));
    }

    let rects_re = Regex::new(r"(?s)<rects>(.*?)</rects>").map_err(regex_error)?;
    let item_re = Regex::new(r"<_>([^<]*)</_>").map_err(regex_error)?;

    rects_re
        .captures_iter(features_xml)
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .map(|block| {
            let rects = item_re
                .captures_iter(block)
                .filter_map(|c| c.get(1).map(|m| m.as_str()))
                .map(parse_rect)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(HaarFeature::new(rects))
        })
        .collect()
}

fn parse_rect(text: &str) -> Result<HaarRect, CascadeError> {
    let parts: Vec<&str> = text.split_whitespace().collect();
    if parts.len() != 5 {
        return Err(CascadeError::Malformed(format!(
            "rect '{}' must be 'x y w h weight'",
            text.trim()
        )));
    }

    // OpenCV writes weights like "-1." so parse as float
    Ok(HaarRect {
        x: parse_number(parts[0], "rect x")?,
        y: parse_number(parts[1], "rect y")?,
        width: parse_number(parts[2], "rect width")?,
        height: parse_number(parts[3], "rect height")?,
        weight: parse_number(parts[4], "rect weight")?,
    })
}

fn section<'a>(xml: &'a str, tag: &str) -> Option<&'a str> {
    let open = format!("<{}>", tag);
    let close = format!("</{}>", tag);
    let start = xml.find(&open)? + open.len();
    let end = start + xml[start..].rfind(&close)?;
    Some(&xml[start..end])
}

fn tag_text(xml: &str, tag: &str) -> Result<Option<String>, CascadeError> {
    let re = Regex::new(&format!(r"<{tag}>\s*([^<]*?)\s*</{tag}>")).map_err(regex_error)?;
    Ok(re
        .captures(xml)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string()))
}

fn required_tag(xml: &str, tag: &str) -> Result<String, CascadeError> {
    tag_text(xml, tag)?.ok_or_else(|| CascadeError::Malformed(format!("missing <{}>", tag)))
}

fn parse_number<T: std::str::FromStr>(text: &str, what: &str) -> Result<T, CascadeError> {
    text.trim()
        .parse::<T>()
        .map_err(|_| CascadeError::Malformed(format!("invalid {}: '{}'", what, text.trim())))
}

fn regex_error(e: regex::Error) -> CascadeError {
    CascadeError::Malformed(format!("internal pattern error: {}", e))
}
