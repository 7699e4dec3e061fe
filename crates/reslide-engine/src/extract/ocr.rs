// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Line-level OCR extractor: one `text` element per recognised line, or one
// `table_cell` per line when the image is a table crop.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use reslide_backend::{OcrBackend, OcrLine, OcrOptions};
use reslide_core::ElementType;
use reslide_core::error::Result;
use reslide_document::ImageProcessor;
use tracing::{debug, info, instrument};

use crate::service::blocking;

use super::{Extraction, ExtractionContext, Extractor, RawElement, SOURCE_KEY, sort_reading_order};

/// Metadata key holding per-character boxes, when requested.
pub const CHARS_KEY: &str = "chars";

/// Extractor backed by an [`OcrBackend`].
#[derive(Clone)]
pub struct TextOcrExtractor {
    backend: Arc<dyn OcrBackend>,
    options: OcrOptions,
}

impl std::fmt::Debug for TextOcrExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextOcrExtractor")
            .field("backend", &self.backend.name())
            .field("options", &self.options)
            .finish()
    }
}

impl TextOcrExtractor {
    pub fn new(backend: Arc<dyn OcrBackend>) -> Self {
        Self {
            backend,
            options: OcrOptions::default(),
        }
    }

    pub fn with_options(mut self, options: OcrOptions) -> Self {
        self.options = options;
        self
    }
}

/// Element type for lines recognised in an image of kind `type_hint`.
pub fn line_type(type_hint: Option<ElementType>) -> ElementType {
    match type_hint {
        Some(ElementType::Table) => ElementType::TableCell,
        _ => ElementType::Text,
    }
}

/// Convert recognised lines of a `width` x `height` image into `kind`
/// elements. Blank lines and lines falling outside the image are dropped.
pub fn lines_to_elements(lines: Vec<OcrLine>, width: u32, height: u32, kind: ElementType) -> Vec<RawElement> {
    let mut out = Vec::with_capacity(lines.len());
    for line in lines {
        let text = line.text.trim();
        if text.is_empty() {
            continue;
        }
        let bbox = line.bbox.clamp_to(width as f64, height as f64);
        if bbox.is_degenerate() {
            debug!(text, "dropping OCR line outside the image");
            continue;
        }
        let mut el = RawElement::new(kind, bbox)
            .with_content(text)
            .with_meta(SOURCE_KEY, "ocr");
        if let Some(confidence) = line.confidence {
            el = el.with_meta("confidence", confidence);
        }
        if !line.chars.is_empty() {
            if let Ok(chars) = serde_json::to_value(&line.chars) {
                el = el.with_meta(CHARS_KEY, chars);
            }
        }
        out.push(el);
    }
    sort_reading_order(&mut out);
    out
}

#[async_trait]
impl Extractor for TextOcrExtractor {
    fn name(&self) -> &str {
        "ocr"
    }

    #[instrument(skip_all, fields(path = %image_path.display(), backend = self.backend.name()))]
    async fn extract(
        &self,
        image_path: &Path,
        type_hint: Option<ElementType>,
        _work_dir: &Path,
    ) -> Result<Extraction> {
        let path = image_path.to_path_buf();
        let image = blocking(move || ImageProcessor::open(&path)).await??;
        let (width, height) = image.dimensions();
        let lines = self
            .backend
            .recognize(image.as_dynamic(), &self.options)
            .await?;
        let elements = lines_to_elements(lines, width, height, line_type(type_hint));
        info!(lines = elements.len(), "OCR extraction complete");
        Ok(Extraction {
            elements,
            context: ExtractionContext::new(self.name()),
        })
    }
}
