// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// In-process OCR backend built on the `ocrs` engine.
//
// # Feature Gate
//
// Only available with the `ocr` feature:
//
// ```toml
// reslide-backend = { path = "crates/reslide-backend", features = ["ocr"] }
// ```
//
// # Model Setup
//
// Two model files are needed, `text-detection.rten` and
// `text-recognition.rten`. Running `ocrs-cli` once downloads them to
// `$XDG_CACHE_HOME/ocrs` (typically `~/.cache/ocrs`), which is the default
// lookup directory here.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use image::DynamicImage;
use ocrs::{ImageSource, OcrEngine, OcrEngineParams, TextItem};
use reslide_core::BBox;
use reslide_core::error::{ReslideError, Result};
use rten::Model;
use rten_imageproc::Rect;
use tracing::{debug, info, instrument};

use crate::traits::{OcrBackend, OcrChar, OcrLine, OcrOptions};

const DETECTION_MODEL_FILENAME: &str = "text-detection.rten";
const RECOGNITION_MODEL_FILENAME: &str = "text-recognition.rten";

fn default_model_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CACHE_HOME") {
        PathBuf::from(xdg).join("ocrs")
    } else if let Ok(home) = std::env::var("HOME") {
        PathBuf::from(home).join(".cache").join("ocrs")
    } else {
        PathBuf::from("ocrs-models")
    }
}

fn ocr_error(detail: impl std::fmt::Display) -> ReslideError {
    ReslideError::backend("local_ocr", detail)
}

/// OCR running on the local CPU. Model loading is the expensive step, so keep
/// one instance around for the whole run.
pub struct LocalOcrBackend {
    engine: Arc<OcrEngine>,
}

impl LocalOcrBackend {
    /// Load the models from `dir`, or from the default cache directory.
    #[instrument]
    pub fn from_model_dir(dir: Option<&Path>) -> Result<Self> {
        let dir = dir.map(Path::to_path_buf).unwrap_or_else(default_model_dir);
        let detection = dir.join(DETECTION_MODEL_FILENAME);
        let recognition = dir.join(RECOGNITION_MODEL_FILENAME);
        for path in [&detection, &recognition] {
            if !path.exists() {
                return Err(ReslideError::Config(format!(
                    "OCR model not found at {}; run `ocrs-cli` once to download models",
                    path.display()
                )));
            }
        }

        info!("loading OCR models");
        let detection_model = Model::load_file(&detection)
            .map_err(|err| ocr_error(format!("failed to load {}: {err}", detection.display())))?;
        let recognition_model = Model::load_file(&recognition)
            .map_err(|err| ocr_error(format!("failed to load {}: {err}", recognition.display())))?;

        let engine = OcrEngine::new(OcrEngineParams {
            detection_model: Some(detection_model),
            recognition_model: Some(recognition_model),
            ..Default::default()
        })
        .map_err(|err| ocr_error(format!("failed to initialise OCR engine: {err}")))?;

        Ok(Self {
            engine: Arc::new(engine),
        })
    }
}

fn rect_to_bbox(rect: Rect) -> BBox {
    BBox::new(
        rect.left() as f64,
        rect.top() as f64,
        rect.right() as f64,
        rect.bottom() as f64,
    )
}

fn recognize_lines(engine: &OcrEngine, image: &DynamicImage, char_boxes: bool) -> Result<Vec<OcrLine>> {
    let rgb = image.to_rgb8();
    let (width, height) = rgb.dimensions();
    let source = ImageSource::from_bytes(rgb.as_raw(), (width, height))
        .map_err(|err| ocr_error(format!("failed to create image source ({width}x{height}): {err}")))?;
    let input = engine
        .prepare_input(source)
        .map_err(|err| ocr_error(format!("preprocessing failed: {err}")))?;

    let words = engine
        .detect_words(&input)
        .map_err(|err| ocr_error(format!("word detection failed: {err}")))?;
    let line_rects = engine.find_text_lines(&input, &words);
    let texts = engine
        .recognize_text(&input, &line_rects)
        .map_err(|err| ocr_error(format!("line recognition failed: {err}")))?;

    let mut lines = Vec::with_capacity(texts.len());
    for line in texts.iter().flatten() {
        let text = line.to_string();
        if text.trim().is_empty() {
            continue;
        }
        let chars = if char_boxes {
            line.chars()
                .map(|c| OcrChar {
                    text: c.char.to_string(),
                    bbox: rect_to_bbox(c.rect),
                })
                .collect()
        } else {
            Vec::new()
        };
        lines.push(OcrLine {
            text: text.trim().to_string(),
            bbox: rect_to_bbox(line.bounding_rect()),
            confidence: None,
            chars,
        });
    }
    debug!(words = words.len(), lines = lines.len(), "local OCR complete");
    Ok(lines)
}

#[async_trait]
impl OcrBackend for LocalOcrBackend {
    fn name(&self) -> &str {
        "local_ocr"
    }

    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    async fn recognize(&self, image: &DynamicImage, options: &OcrOptions) -> Result<Vec<OcrLine>> {
        let engine = Arc::clone(&self.engine);
        let image = image.clone();
        let char_boxes = options.char_boxes;
        tokio::task::spawn_blocking(move || recognize_lines(&engine, &image, char_boxes))
            .await
            .map_err(|e| ocr_error(format!("OCR task panicked: {e}")))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_models_are_a_config_error() {
        let dir = std::env::temp_dir().join("reslide-no-models-here");
        let err = LocalOcrBackend::from_model_dir(Some(dir.as_path())).err();
        assert!(matches!(err, Some(ReslideError::Config(_))));
    }
}
