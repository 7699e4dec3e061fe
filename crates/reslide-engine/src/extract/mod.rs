// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Extractors — turn a raster into raw detected elements.
//
// An extractor reports elements in the pixel space of the image it was given.
// Mapping into the root image's space is the orchestrator's job.

pub mod hybrid;
pub mod layout;
pub mod ocr;

use std::path::Path;

use async_trait::async_trait;
use reslide_core::error::Result;
use reslide_core::{BBox, ElementType, Metadata};
use serde_json::Value;

pub use hybrid::{HybridExtractor, MergeThresholds, merge};
pub use layout::LayoutExtractor;
pub use ocr::TextOcrExtractor;

/// Metadata key naming the provider that produced an element.
pub const SOURCE_KEY: &str = "source";

/// One detection, in the pixel space of the extracted image.
#[derive(Debug, Clone, PartialEq)]
pub struct RawElement {
    pub element_type: ElementType,
    pub bbox: BBox,
    pub content: Option<String>,
    /// Raster supplied by the backend (e.g. a layout asset), if any.
    pub image_path: Option<std::path::PathBuf>,
    pub metadata: Metadata,
}

impl RawElement {
    pub fn new(element_type: ElementType, bbox: BBox) -> Self {
        Self {
            element_type,
            bbox,
            content: None,
            image_path: None,
            metadata: Metadata::new(),
        }
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn with_meta(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    pub fn source(&self) -> Option<&str> {
        self.metadata.get(SOURCE_KEY).and_then(Value::as_str)
    }
}

/// Follow-up state produced alongside the elements.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractionContext {
    /// Extractor that answered.
    pub provider: String,
    /// Where backend assets for this call were written.
    pub asset_dir: Option<std::path::PathBuf>,
    /// Partial failures absorbed by the extractor (e.g. one hybrid half failed).
    pub degraded: Vec<String>,
    pub extra: Metadata,
}

impl ExtractionContext {
    pub fn new(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            ..Self::default()
        }
    }
}

/// Elements plus their context.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    pub elements: Vec<RawElement>,
    pub context: ExtractionContext,
}

/// Turns an image into raw elements.
#[async_trait]
pub trait Extractor: Send + Sync {
    fn name(&self) -> &str;

    /// Extract from the image at `image_path`. `type_hint` is the type of the
    /// element this image was cropped from (`None` at the root); `work_dir`
    /// is a directory private to this call for any assets written.
    async fn extract(
        &self,
        image_path: &Path,
        type_hint: Option<ElementType>,
        work_dir: &Path,
    ) -> Result<Extraction>;
}

/// Sort into reading order: top to bottom, then left to right.
pub fn sort_reading_order(elements: &mut [RawElement]) {
    elements.sort_by(|a, b| {
        a.bbox
            .y0
            .total_cmp(&b.bbox.y0)
            .then(a.bbox.x0.total_cmp(&b.bbox.x0))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reading_order_is_rows_then_columns() {
        let mut els = vec![
            RawElement::new(ElementType::Text, BBox::new(500.0, 100.0, 600.0, 120.0)),
            RawElement::new(ElementType::Title, BBox::new(10.0, 10.0, 300.0, 40.0)),
            RawElement::new(ElementType::Text, BBox::new(10.0, 100.0, 200.0, 120.0)),
        ];
        sort_reading_order(&mut els);
        assert_eq!(els[0].element_type, ElementType::Title);
        assert_eq!(els[1].bbox.x0, 10.0);
        assert_eq!(els[2].bbox.x0, 500.0);
    }

    #[test]
    fn source_reads_metadata() {
        let el = RawElement::new(ElementType::Text, BBox::new(0.0, 0.0, 1.0, 1.0))
            .with_meta(SOURCE_KEY, "ocr");
        assert_eq!(el.source(), Some("ocr"));
    }
}
