// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Temporary file lifecycle of the path-based NSFW backend

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use fabstir_moderation_node::moderation::{ModerationPipeline, VerdictComposer};
use fabstir_moderation_node::vision::nsfw::{
    ClassificationError, NsfwClassifier, PathClassifier, TempFileNsfwBackend,
};
use fabstir_moderation_node::vision::DecodedImage;

use crate::common::{encode_png, synthetic_detector, white_square_image};

type SeenPaths = Arc<Mutex<Vec<PathBuf>>>;

/// Records every path it is given
struct RecordingClassifier {
    seen: SeenPaths,
}

fn recording_classifier() -> (RecordingClassifier, SeenPaths) {
    let seen = SeenPaths::default();
    (RecordingClassifier { seen: seen.clone() }, seen)
}

impl PathClassifier for RecordingClassifier {
    fn classify_path(&self, path: &Path) -> Result<HashMap<String, f32>, ClassificationError> {
        assert!(path.exists(), "classifier input missing during classification");
        image::open(path).expect("temporary input is a readable image");
        self.seen.lock().unwrap().push(path.to_path_buf());
        Ok(HashMap::from([
            ("unsafe".to_string(), 0.7),
            ("safe".to_string(), 0.3),
        ]))
    }
}

struct FailingClassifier;

impl PathClassifier for FailingClassifier {
    fn classify_path(&self, _path: &Path) -> Result<HashMap<String, f32>, ClassificationError> {
        Err(ClassificationError::Inference("runtime error".to_string()))
    }
}

struct PanickingClassifier;

impl PathClassifier for PanickingClassifier {
    fn classify_path(&self, _path: &Path) -> Result<HashMap<String, f32>, ClassificationError> {
        panic!("classifier crashed");
    }
}

fn entries(dir: &Path) -> usize {
    std::fs::read_dir(dir).unwrap().count()
}

fn sample() -> DecodedImage {
    DecodedImage::from_rgb(white_square_image(64, 32))
}

/// Test 1: Temp file exists while classifying and is gone afterwards
#[test]
fn test_temp_file_removed_after_success() {
    let dir = tempfile::tempdir().unwrap();
    let (recorder, seen) = recording_classifier();
    let backend = TempFileNsfwBackend::new(recorder).with_temp_dir(dir.path());

    let score = backend.score(&sample()).unwrap();
    assert!((score - 0.7).abs() < 1e-6);
    assert_eq!(entries(dir.path()), 0);

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert!(!seen[0].exists());
}

/// Test 2: Temp file removed when the classifier fails
#[test]
fn test_temp_file_removed_after_failure() {
    let dir = tempfile::tempdir().unwrap();
    let backend = TempFileNsfwBackend::new(FailingClassifier).with_temp_dir(dir.path());

    assert!(backend.score(&sample()).is_err());
    assert_eq!(entries(dir.path()), 0);
}

/// Test 3: Temp file removed when the classifier panics
#[test]
fn test_temp_file_removed_after_panic() {
    let dir = tempfile::tempdir().unwrap();
    let backend = TempFileNsfwBackend::new(PanickingClassifier).with_temp_dir(dir.path());
    let image = sample();

    let outcome = catch_unwind(AssertUnwindSafe(|| backend.score(&image)));
    assert!(outcome.is_err());
    assert_eq!(entries(dir.path()), 0);
}

/// Test 4: Every call gets a fresh, server-generated name
#[test]
fn test_temp_names_are_unique() {
    let dir = tempfile::tempdir().unwrap();
    let (recorder, seen) = recording_classifier();
    let backend = TempFileNsfwBackend::new(recorder).with_temp_dir(dir.path());
    let image = sample();

    for _ in 0..8 {
        backend.score(&image).unwrap();
    }

    let seen = seen.lock().unwrap();
    let mut names: Vec<_> = seen.iter().map(|p| p.file_name().unwrap().to_owned()).collect();
    names.sort();
    names.dedup();
    assert_eq!(names.len(), 8);
    for path in seen.iter() {
        assert_eq!(path.parent(), Some(dir.path()));
        let name = path.file_name().unwrap().to_string_lossy();
        assert!(name.starts_with("moderation-") && name.ends_with(".png"), "{}", name);
    }
}

/// Test 5: No leftovers after parallel requests through the pipeline
#[test]
fn test_no_leftovers_under_concurrency() {
    let dir = tempfile::tempdir().unwrap();
    let (recorder, seen) = recording_classifier();
    let pipeline = ModerationPipeline::new(
        Arc::new(synthetic_detector()),
        Arc::new(TempFileNsfwBackend::new(recorder).with_temp_dir(dir.path())),
        VerdictComposer::default(),
    );
    let png = encode_png(&white_square_image(96, 40));

    std::thread::scope(|scope| {
        for _ in 0..6 {
            scope.spawn(|| {
                let verdict = pipeline.analyze(&png, Some("image/png")).unwrap();
                assert!(!verdict.is_safe);
            });
        }
    });

    assert_eq!(seen.lock().unwrap().len(), 6);
    assert_eq!(entries(dir.path()), 0);
}
