// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Hybrid extraction: layout regions and OCR lines, reconciled.
//
// Both extractors run concurrently on the same image. The merge keeps the
// layout's pictorial regions and the OCR's tight text lines:
//
// 1. an OCR line mostly inside an image/figure/chart/diagram region is part of
//    that picture and is dropped;
// 2. a table region that mostly contains an OCR line is dropped, and the lines
//    inside it are kept as table cells;
// 3. any other layout region overlapping an OCR line is dropped in favour of
//    the line;
// 4. everything that survives is kept, in reading order.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use reslide_core::error::{ReslideError, Result};
use reslide_core::{ElementType, ReconstructionSettings};
use tracing::{debug, info, instrument, warn};

use super::{Extraction, ExtractionContext, Extractor, RawElement, sort_reading_order};

/// Metadata key recording which side of the merge an element came from.
pub const MERGE_SOURCE_KEY: &str = "merge_source";

/// Containment and overlap cut-offs for the merge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MergeThresholds {
    /// Fraction of an OCR line's area inside a region for it to count as contained.
    pub contain: f64,
    /// Overlap, relative to the smaller box, at which a layout region yields.
    pub intersect: f64,
}

impl Default for MergeThresholds {
    fn default() -> Self {
        Self {
            contain: 0.8,
            intersect: 0.3,
        }
    }
}

impl From<&ReconstructionSettings> for MergeThresholds {
    fn from(settings: &ReconstructionSettings) -> Self {
        Self {
            contain: settings.contain_threshold,
            intersect: settings.intersection_threshold,
        }
    }
}

/// Reconcile layout elements with OCR lines.
pub fn merge(
    layout: Vec<RawElement>,
    ocr: Vec<RawElement>,
    thresholds: MergeThresholds,
) -> Vec<RawElement> {
    let visuals: Vec<&RawElement> = layout
        .iter()
        .filter(|e| e.element_type.is_visual())
        .collect();

    let tables: Vec<&RawElement> = layout
        .iter()
        .filter(|e| e.element_type == ElementType::Table)
        .collect();

    // Rule 1.
    let lines: Vec<RawElement> = ocr
        .into_iter()
        .filter(|line| {
            let inside_picture = visuals
                .iter()
                .any(|v| line.bbox.containment_in(&v.bbox) >= thresholds.contain);
            if inside_picture {
                debug!(text = ?line.content, "OCR line belongs to a picture");
            }
            !inside_picture
        })
        .map(|mut line| {
            // Rule 2: a line standing in for its table is one of its cells.
            if tables
                .iter()
                .any(|t| line.bbox.containment_in(&t.bbox) >= thresholds.contain)
            {
                line.element_type = ElementType::TableCell;
            }
            line
        })
        .collect();

    let mut merged = Vec::with_capacity(layout.len() + lines.len());
    for element in layout {
        let keep = if element.element_type.is_visual() {
            true
        } else if element.element_type == ElementType::Table {
            // Rule 2.
            !lines
                .iter()
                .any(|line| line.bbox.containment_in(&element.bbox) >= thresholds.contain)
        } else {
            // Rule 3.
            !lines
                .iter()
                .any(|line| element.bbox.intersection_ratio(&line.bbox) >= thresholds.intersect)
        };
        if keep {
            merged.push(element.with_meta(MERGE_SOURCE_KEY, "layout"));
        } else {
            debug!(kind = %element.element_type, "layout region replaced by OCR lines");
        }
    }
    merged.extend(lines.into_iter().map(|l| l.with_meta(MERGE_SOURCE_KEY, "ocr")));
    sort_reading_order(&mut merged);
    merged
}

/// Runs a layout extractor and an OCR extractor together and merges them.
#[derive(Clone)]
pub struct HybridExtractor {
    layout: Arc<dyn Extractor>,
    ocr: Arc<dyn Extractor>,
    thresholds: MergeThresholds,
}

impl std::fmt::Debug for HybridExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HybridExtractor")
            .field("layout", &self.layout.name())
            .field("ocr", &self.ocr.name())
            .field("thresholds", &self.thresholds)
            .finish()
    }
}

impl HybridExtractor {
    pub fn new(layout: Arc<dyn Extractor>, ocr: Arc<dyn Extractor>, thresholds: MergeThresholds) -> Self {
        Self {
            layout,
            ocr,
            thresholds,
        }
    }
}

#[async_trait]
impl Extractor for HybridExtractor {
    fn name(&self) -> &str {
        "hybrid"
    }

    #[instrument(skip_all, fields(path = %image_path.display(), hint = ?type_hint))]
    async fn extract(
        &self,
        image_path: &Path,
        type_hint: Option<ElementType>,
        work_dir: &Path,
    ) -> Result<Extraction> {
        let (layout, ocr) = tokio::join!(
            self.layout.extract(image_path, type_hint, work_dir),
            self.ocr.extract(image_path, type_hint, work_dir),
        );

        let mut context = ExtractionContext::new(self.name());
        let (layout_elements, ocr_elements) = match (layout, ocr) {
            (Ok(l), Ok(o)) => {
                context.asset_dir = l.context.asset_dir;
                (l.elements, o.elements)
            }
            (Ok(l), Err(err)) => {
                warn!(error = %err, "OCR half failed, using layout alone");
                context.degraded.push(format!("{} extractor failed: {err}", self.ocr.name()));
                context.asset_dir = l.context.asset_dir;
                (l.elements, Vec::new())
            }
            (Err(err), Ok(o)) => {
                warn!(error = %err, "layout half failed, using OCR alone");
                context
                    .degraded
                    .push(format!("{} extractor failed: {err}", self.layout.name()));
                (Vec::new(), o.elements)
            }
            (Err(layout_err), Err(ocr_err)) => {
                return Err(ReslideError::Extraction(format!(
                    "both extractors failed: layout: {layout_err}; ocr: {ocr_err}"
                )));
            }
        };

        let (n_layout, n_ocr) = (layout_elements.len(), ocr_elements.len());
        let elements = merge(layout_elements, ocr_elements, self.thresholds);
        info!(
            layout = n_layout,
            ocr = n_ocr,
            merged = elements.len(),
            "hybrid extraction merged"
        );
        Ok(Extraction { elements, context })
    }
}

#[cfg(test)]
mod tests {
    use reslide_core::BBox;

    use super::*;
    use crate::extract::SOURCE_KEY;

    fn layout(kind: ElementType, bbox: BBox) -> RawElement {
        RawElement::new(kind, bbox).with_meta(SOURCE_KEY, "layout")
    }

    fn line(text: &str, bbox: BBox) -> RawElement {
        RawElement::new(ElementType::Text, bbox)
            .with_content(text)
            .with_meta(SOURCE_KEY, "ocr")
    }

    fn merge_default(l: Vec<RawElement>, o: Vec<RawElement>) -> Vec<RawElement> {
        merge(l, o, MergeThresholds::default())
    }

    #[test]
    fn line_inside_picture_is_dropped_and_picture_kept() {
        let picture = BBox::new(100.0, 100.0, 500.0, 400.0);
        let out = merge_default(
            vec![layout(ElementType::Image, picture)],
            vec![line("axis label", BBox::new(120.0, 350.0, 300.0, 380.0))],
        );
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].element_type, ElementType::Image);
        assert_eq!(out[0].metadata[MERGE_SOURCE_KEY], "layout");
    }

    #[test]
    fn table_yields_to_contained_lines() {
        let table = BBox::new(0.0, 0.0, 400.0, 300.0);
        let out = merge_default(
            vec![layout(ElementType::Table, table)],
            vec![
                line("a", BBox::new(10.0, 10.0, 100.0, 30.0)),
                line("b", BBox::new(10.0, 40.0, 100.0, 60.0)),
            ],
        );
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|e| e.element_type == ElementType::TableCell));
        assert!(out.iter().all(|e| e.metadata[MERGE_SOURCE_KEY] == "ocr"));
    }

    #[test]
    fn only_lines_inside_the_table_become_cells() {
        let out = merge_default(
            vec![layout(ElementType::Table, BBox::new(0.0, 100.0, 400.0, 300.0))],
            vec![
                line("Heading", BBox::new(0.0, 10.0, 300.0, 60.0)),
                line("12.5", BBox::new(10.0, 120.0, 100.0, 150.0)),
            ],
        );
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].content.as_deref(), Some("Heading"));
        assert_eq!(out[0].element_type, ElementType::Text);
        assert_eq!(out[1].element_type, ElementType::TableCell);
    }

    #[test]
    fn table_without_lines_survives() {
        let out = merge_default(
            vec![layout(ElementType::Table, BBox::new(0.0, 0.0, 400.0, 300.0))],
            vec![line("far", BBox::new(500.0, 500.0, 600.0, 520.0))],
        );
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].element_type, ElementType::Table);
    }

    #[test]
    fn overlapping_text_region_is_replaced() {
        let out = merge_default(
            vec![layout(ElementType::Paragraph, BBox::new(100.0, 250.0, 800.0, 450.0))],
            vec![
                line("one", BBox::new(100.0, 250.0, 700.0, 295.0)),
                line("two", BBox::new(100.0, 310.0, 650.0, 355.0)),
                line("three", BBox::new(100.0, 370.0, 720.0, 415.0)),
            ],
        );
        let texts: Vec<_> = out.iter().filter_map(|e| e.content.as_deref()).collect();
        assert_eq!(texts, vec!["one", "two", "three"]);
    }

    #[test]
    fn slight_overlap_keeps_both() {
        // Line overlaps the title by 10% of its own area.
        let out = merge_default(
            vec![layout(ElementType::Title, BBox::new(0.0, 0.0, 1000.0, 100.0))],
            vec![line("below", BBox::new(0.0, 95.0, 100.0, 145.0))],
        );
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn thresholds_are_configurable() {
        let strict = MergeThresholds {
            contain: 0.99,
            intersect: 0.3,
        };
        // 90% inside: contained at 0.8, not at 0.99.
        let picture = BBox::new(0.0, 0.0, 100.0, 100.0);
        let l = line("edge", BBox::new(10.0, 10.0, 110.0, 20.0));
        assert_eq!(merge_default(vec![layout(ElementType::Chart, picture)], vec![l.clone()]).len(), 1);
        assert_eq!(merge(vec![layout(ElementType::Chart, picture)], vec![l], strict).len(), 2);
    }

    #[tokio::test]
    async fn one_failing_half_degrades() {
        use reslide_backend::stub::{FailingBackend, StaticOcrBackend, ocr_line};
        use tempfile::TempDir;

        use crate::extract::{LayoutExtractor, TextOcrExtractor};

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("p.png");
        image::RgbImage::from_pixel(200, 100, image::Rgb([255, 255, 255]))
            .save(&path)
            .unwrap();
        let ocr = TextOcrExtractor::new(Arc::new(
            StaticOcrBackend::new().with_fallback(vec![ocr_line("x", BBox::new(1.0, 1.0, 50.0, 20.0), 0.9)]),
        ));
        let broken = LayoutExtractor::new(Arc::new(FailingBackend::new("down")));
        let hybrid = HybridExtractor::new(Arc::new(broken.clone()), Arc::new(ocr), MergeThresholds::default());
        let out = hybrid.extract(&path, None, dir.path()).await.unwrap();
        assert_eq!(out.elements.len(), 1);
        assert_eq!(out.context.degraded.len(), 1);

        let both = HybridExtractor::new(Arc::new(broken.clone()), Arc::new(broken), MergeThresholds::default());
        assert!(matches!(
            both.extract(&path, None, dir.path()).await,
            Err(ReslideError::Extraction(_))
        ));
    }
}
