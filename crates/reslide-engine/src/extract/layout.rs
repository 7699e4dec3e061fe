// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Layout-analysis extractor.
//
// The page is submitted to a batch layout backend and polled until analysed.
// Regions come back in the backend's page space and are scaled to pixels.
// Header and footer blocks holding only a picture (or only text) become
// `image` (or `text`) elements; captions nested under image and table blocks
// become text elements of their own.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reslide_backend::{LayoutBackend, LayoutBlock, LayoutDocument, LayoutPoll};
use reslide_core::error::{ReslideError, Result};
use reslide_core::{BBox, ElementType};
use tracing::{debug, info, instrument, warn};

use crate::service::blocking;

use super::{Extraction, ExtractionContext, Extractor, RawElement, SOURCE_KEY, sort_reading_order};

/// Metadata key holding the backend's own label for a region.
pub const LAYOUT_TYPE_KEY: &str = "layout_type";

const ASSET_KEY: &str = "asset";

/// Extractor backed by a [`LayoutBackend`].
#[derive(Clone)]
pub struct LayoutExtractor {
    backend: Arc<dyn LayoutBackend>,
    poll_interval: Duration,
    max_polls: u32,
}

impl std::fmt::Debug for LayoutExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LayoutExtractor")
            .field("backend", &self.backend.name())
            .field("poll_interval", &self.poll_interval)
            .field("max_polls", &self.max_polls)
            .finish()
    }
}

impl LayoutExtractor {
    pub fn new(backend: Arc<dyn LayoutBackend>) -> Self {
        Self {
            backend,
            poll_interval: Duration::from_secs(2),
            max_polls: 150,
        }
    }

    pub fn with_polling(mut self, interval: Duration, max_polls: u32) -> Self {
        self.poll_interval = interval;
        self.max_polls = max_polls.max(1);
        self
    }

    /// Submit and poll until the backend finishes, fails, or the poll budget
    /// runs out.
    async fn analyse(&self, file_name: &str, bytes: Vec<u8>) -> Result<LayoutDocument> {
        let task_id = self.backend.submit(file_name, bytes).await?;
        debug!(%task_id, "layout task submitted");
        for attempt in 1..=self.max_polls {
            match self.backend.poll(&task_id).await? {
                LayoutPoll::Done(document) => {
                    debug!(%task_id, attempt, blocks = document.blocks.len(), "layout task done");
                    return Ok(document);
                }
                LayoutPoll::Failed(reason) => {
                    return Err(ReslideError::Extraction(format!(
                        "layout task {task_id} failed: {reason}"
                    )));
                }
                LayoutPoll::Pending => tokio::time::sleep(self.poll_interval).await,
            }
        }
        Err(ReslideError::Timeout(format!(
            "layout task {task_id} after {} polls",
            self.max_polls
        )))
    }
}

#[async_trait]
impl Extractor for LayoutExtractor {
    fn name(&self) -> &str {
        "layout"
    }

    #[instrument(skip_all, fields(path = %image_path.display(), hint = ?type_hint))]
    async fn extract(
        &self,
        image_path: &Path,
        type_hint: Option<ElementType>,
        work_dir: &Path,
    ) -> Result<Extraction> {
        let bytes = tokio::fs::read(image_path).await?;
        let header_path = image_path.to_path_buf();
        let (width, height) = blocking(move || image::image_dimensions(&header_path))
            .await?
            .map_err(|err| ReslideError::ImageLoad {
                path: image_path.display().to_string(),
                detail: err.to_string(),
            })?;
        let file_name = image_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "page.png".into());

        let mut document = self.analyse(&file_name, bytes).await?;
        let mut elements = map_document(&document, (width, height));

        let mut context = ExtractionContext::new(self.name());
        if elements.iter().any(|e| e.metadata.contains_key(ASSET_KEY)) {
            let asset_dir = work_dir.join("assets");
            tokio::fs::create_dir_all(&asset_dir).await?;
            for element in &mut elements {
                let Some(name) = element.metadata.remove(ASSET_KEY) else {
                    continue;
                };
                let Some(name) = name.as_str() else { continue };
                match document.assets.remove(name) {
                    Some(data) => {
                        let path = asset_dir.join(sanitize_asset_name(name));
                        tokio::fs::write(&path, data).await?;
                        element.image_path = Some(path);
                    }
                    None => warn!(asset = name, "layout referenced a missing asset"),
                }
            }
            context.asset_dir = Some(asset_dir);
        }
        info!(elements = elements.len(), "layout extraction complete");
        Ok(Extraction { elements, context })
    }
}

/// Keep only the final path component of a backend-supplied asset name.
fn sanitize_asset_name(name: &str) -> PathBuf {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    if base.is_empty() || base == ".." || base == "." {
        PathBuf::from("asset.bin")
    } else {
        PathBuf::from(base)
    }
}

/// Map a layout document onto an image of `size` pixels. Elements referencing
/// an embedded raster carry its name under the `asset` metadata key.
pub fn map_document(document: &LayoutDocument, size: (u32, u32)) -> Vec<RawElement> {
    let (w, h) = (size.0 as f64, size.1 as f64);
    let sx = if document.page_width > 0.0 { w / document.page_width } else { 1.0 };
    let sy = if document.page_height > 0.0 { h / document.page_height } else { 1.0 };
    let to_pixels = |b: &LayoutBlock| BBox::from_array(b.bbox).scale(sx, sy).clamp_to(w, h);

    let mut out = Vec::new();
    for block in &document.blocks {
        let bbox = to_pixels(block);
        if bbox.is_degenerate() {
            debug!(kind = %block.kind, "skipping empty layout region");
            continue;
        }
        let Some(element_type) = classify(block) else {
            debug!(kind = %block.kind, "skipping unrecognised layout region");
            continue;
        };

        if element_type.is_visual() || element_type == ElementType::Table {
            let mut el = RawElement::new(element_type, bbox);
            if let Some(asset) = first_asset(block) {
                el = el.with_meta(ASSET_KEY, asset);
            }
            if element_type == ElementType::Table {
                el.content = first_html(block);
            }
            out.push(tag(el, block));
            for nested in &block.blocks {
                if is_caption(&nested.kind) {
                    let text = block_text(nested);
                    let nested_box = to_pixels(nested);
                    if !text.is_empty() && !nested_box.is_degenerate() {
                        out.push(tag(
                            RawElement::new(ElementType::Text, nested_box).with_content(text),
                            nested,
                        ));
                    }
                }
            }
        } else {
            let text = block_text(block);
            if text.is_empty() {
                continue;
            }
            out.push(tag(RawElement::new(element_type, bbox).with_content(text), block));
        }
    }
    sort_reading_order(&mut out);
    out
}

fn tag(el: RawElement, block: &LayoutBlock) -> RawElement {
    let el = el
        .with_meta(SOURCE_KEY, "layout")
        .with_meta(LAYOUT_TYPE_KEY, block.kind.clone());
    match block.score {
        Some(score) => el.with_meta("confidence", score),
        None => el,
    }
}

fn is_caption(kind: &str) -> bool {
    kind.ends_with("_caption") || kind.ends_with("_footnote") || kind == "caption"
}

/// Element type of a block, after header/footer reclassification.
fn classify(block: &LayoutBlock) -> Option<ElementType> {
    let kind = block.kind.to_ascii_lowercase();
    let base = match kind.as_str() {
        "image_body" => ElementType::Image,
        "table_body" => ElementType::Table,
        "chart_body" => ElementType::Chart,
        k if is_caption(k) => ElementType::Text,
        "interline_equation" => ElementType::Image,
        k => ElementType::from_label(k)?,
    };
    if matches!(base, ElementType::Header | ElementType::Footer) {
        let has_image = first_asset(block).is_some();
        let has_text = !block_text(block).is_empty();
        return Some(match (has_image, has_text) {
            (true, false) => ElementType::Image,
            (false, true) => ElementType::Text,
            _ => base,
        });
    }
    Some(base)
}

/// All text of a block and its nested blocks, one line per layout line.
fn block_text(block: &LayoutBlock) -> String {
    let mut lines = Vec::new();
    collect_lines(block, &mut lines);
    lines.join("\n").trim().to_string()
}

fn collect_lines(block: &LayoutBlock, lines: &mut Vec<String>) {
    for line in &block.lines {
        let text: String = line
            .spans
            .iter()
            .filter(|s| s.is_text())
            .filter_map(|s| s.content.as_deref())
            .collect();
        if !text.trim().is_empty() {
            lines.push(text.trim().to_string());
        }
    }
    for nested in &block.blocks {
        collect_lines(nested, lines);
    }
}

fn first_asset(block: &LayoutBlock) -> Option<String> {
    block
        .lines
        .iter()
        .flat_map(|l| &l.spans)
        .find(|s| s.is_image())
        .and_then(|s| s.image_path.clone())
        .or_else(|| {
            block
                .blocks
                .iter()
                .filter(|b| !is_caption(&b.kind))
                .find_map(first_asset)
        })
}

fn first_html(block: &LayoutBlock) -> Option<String> {
    block
        .lines
        .iter()
        .flat_map(|l| &l.spans)
        .find_map(|s| s.html.clone())
        .or_else(|| block.blocks.iter().find_map(first_html))
}

#[cfg(test)]
mod tests {
    use reslide_backend::stub::{FailingBackend, StaticLayoutBackend};
    use reslide_backend::{LayoutLine, LayoutSpan};
    use tempfile::TempDir;

    use super::*;

    fn text_span(t: &str) -> LayoutSpan {
        LayoutSpan {
            kind: "text".into(),
            content: Some(t.into()),
            ..LayoutSpan::default()
        }
    }

    fn image_span(name: &str) -> LayoutSpan {
        LayoutSpan {
            kind: "image".into(),
            image_path: Some(name.into()),
            ..LayoutSpan::default()
        }
    }

    fn block(kind: &str, bbox: [f64; 4], spans: Vec<LayoutSpan>) -> LayoutBlock {
        LayoutBlock {
            kind: kind.into(),
            bbox,
            lines: vec![LayoutLine { spans }],
            ..LayoutBlock::default()
        }
    }

    fn page(blocks: Vec<LayoutBlock>) -> LayoutDocument {
        LayoutDocument {
            page_width: 960.0,
            page_height: 540.0,
            blocks,
            ..LayoutDocument::default()
        }
    }

    #[test]
    fn page_space_is_scaled_to_pixels() {
        let doc = page(vec![block("title", [50.0, 25.0, 450.0, 75.0], vec![text_span("Hi")])]);
        let els = map_document(&doc, (1920, 1080));
        assert_eq!(els.len(), 1);
        assert_eq!(els[0].element_type, ElementType::Title);
        assert!(els[0].bbox.approx_eq(&BBox::new(100.0, 50.0, 900.0, 150.0), 1e-9));
        assert_eq!(els[0].source(), Some("layout"));
    }

    #[test]
    fn headers_are_reclassified_by_content() {
        let doc = page(vec![
            block("header", [0.0, 0.0, 100.0, 20.0], vec![image_span("logo.png")]),
            block("footer", [0.0, 500.0, 100.0, 520.0], vec![text_span("Page 3")]),
            block(
                "header",
                [200.0, 0.0, 400.0, 20.0],
                vec![image_span("mark.png"), text_span("ACME")],
            ),
        ]);
        let types: Vec<_> = map_document(&doc, (960, 540))
            .iter()
            .map(|e| e.element_type)
            .collect();
        assert_eq!(types, vec![ElementType::Image, ElementType::Header, ElementType::Text]);
    }

    #[test]
    fn captions_become_text_elements() {
        let mut figure = block("image", [100.0, 100.0, 500.0, 400.0], vec![]);
        figure.blocks = vec![
            block("image_body", [100.0, 100.0, 500.0, 360.0], vec![image_span("fig.png")]),
            block("image_caption", [100.0, 370.0, 500.0, 400.0], vec![text_span("Figure 1")]),
        ];
        let els = map_document(&page(vec![figure]), (960, 540));
        assert_eq!(els.len(), 2);
        assert_eq!(els[0].element_type, ElementType::Image);
        assert_eq!(els[0].metadata.get(ASSET_KEY).and_then(|v| v.as_str()), Some("fig.png"));
        assert_eq!(els[1].content.as_deref(), Some("Figure 1"));
    }

    #[test]
    fn empty_and_unknown_blocks_are_skipped() {
        let doc = page(vec![
            block("text", [0.0, 0.0, 100.0, 20.0], vec![text_span("   ")]),
            block("mystery", [0.0, 30.0, 100.0, 50.0], vec![text_span("x")]),
            block("text", [10.0, 10.0, 10.0, 40.0], vec![text_span("flat")]),
        ]);
        assert!(map_document(&doc, (960, 540)).is_empty());
    }

    #[test]
    fn asset_names_cannot_escape() {
        assert_eq!(sanitize_asset_name("../../etc/passwd"), PathBuf::from("passwd"));
        assert_eq!(sanitize_asset_name("images/a.png"), PathBuf::from("a.png"));
        assert_eq!(sanitize_asset_name(".."), PathBuf::from("asset.bin"));
    }

    fn write_page(dir: &Path) -> PathBuf {
        let path = dir.join("page.png");
        image::RgbImage::from_pixel(960, 540, image::Rgb([255, 255, 255]))
            .save(&path)
            .unwrap();
        path
    }

    #[tokio::test]
    async fn polls_until_done_and_writes_assets() {
        let dir = TempDir::new().unwrap();
        let path = write_page(dir.path());
        let mut doc = page(vec![block("image", [10.0, 10.0, 300.0, 200.0], vec![image_span("a.png")])]);
        doc.assets.insert("a.png".into(), vec![1, 2, 3]);
        let backend = Arc::new(StaticLayoutBackend::new().with_fallback(doc).with_pending_polls(2));
        let extractor = LayoutExtractor::new(backend).with_polling(Duration::from_millis(1), 5);

        let out = extractor.extract(&path, None, dir.path()).await.unwrap();
        assert_eq!(out.elements.len(), 1);
        let asset = out.elements[0].image_path.clone().unwrap();
        assert_eq!(std::fs::read(asset).unwrap(), vec![1, 2, 3]);
        assert!(!out.elements[0].metadata.contains_key(ASSET_KEY));
    }

    #[tokio::test]
    async fn poll_budget_is_a_timeout() {
        let dir = TempDir::new().unwrap();
        let path = write_page(dir.path());
        let backend = Arc::new(StaticLayoutBackend::new().with_pending_polls(10));
        let extractor = LayoutExtractor::new(backend).with_polling(Duration::from_millis(1), 3);
        let err = extractor.extract(&path, None, dir.path()).await.unwrap_err();
        assert!(matches!(err, ReslideError::Timeout(_)));
    }

    #[tokio::test]
    async fn unreadable_page_is_an_image_load_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("page.png");
        std::fs::write(&path, b"not a png").unwrap();
        let extractor = LayoutExtractor::new(Arc::new(StaticLayoutBackend::new()));
        let err = extractor.extract(&path, None, dir.path()).await.unwrap_err();
        assert!(matches!(err, ReslideError::ImageLoad { .. }));
    }

    #[tokio::test]
    async fn backend_errors_propagate() {
        let dir = TempDir::new().unwrap();
        let path = write_page(dir.path());
        let extractor = LayoutExtractor::new(Arc::new(FailingBackend::new("down")));
        assert!(extractor.extract(&path, None, dir.path()).await.is_err());
    }
}
