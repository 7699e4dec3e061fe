// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Deterministic in-process backends for offline runs and tests.
//
// Layout and OCR answers are keyed by image size, so a recursive run can give
// the page and each of its crops a different canned answer. `FailingBackend`
// implements every trait and always errors.

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use image::{DynamicImage, GrayImage, ImageReader, Rgba, RgbaImage};
use reslide_core::BBox;
use reslide_core::error::{ReslideError, Result};

use crate::traits::*;

// -- Layout -----------------------------------------------------------------------

/// Layout backend answering from a table of canned documents.
#[derive(Debug, Default)]
pub struct StaticLayoutBackend {
    documents: HashMap<(u32, u32), LayoutDocument>,
    fallback: Option<LayoutDocument>,
    pending_polls: usize,
    tasks: Mutex<HashMap<String, (Option<LayoutDocument>, usize)>>,
    submissions: AtomicUsize,
}

impl StaticLayoutBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer for images of exactly this size.
    pub fn with_document(mut self, size: (u32, u32), document: LayoutDocument) -> Self {
        self.documents.insert(size, document);
        self
    }

    /// Answer for any other size.
    pub fn with_fallback(mut self, document: LayoutDocument) -> Self {
        self.fallback = Some(document);
        self
    }

    /// Report `Pending` this many times before each task completes.
    pub fn with_pending_polls(mut self, polls: usize) -> Self {
        self.pending_polls = polls;
        self
    }

    pub fn submissions(&self) -> usize {
        self.submissions.load(Ordering::SeqCst)
    }
}

fn encoded_dimensions(bytes: &[u8]) -> Result<(u32, u32)> {
    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(ReslideError::Io)?
        .into_dimensions()
        .map_err(|e| ReslideError::backend("layout", format!("unreadable upload: {e}")))
}

#[async_trait]
impl LayoutBackend for StaticLayoutBackend {
    fn name(&self) -> &str {
        "static_layout"
    }

    async fn submit(&self, _file_name: &str, image_bytes: Vec<u8>) -> Result<String> {
        let size = encoded_dimensions(&image_bytes)?;
        let n = self.submissions.fetch_add(1, Ordering::SeqCst);
        let task_id = format!("task-{n}");
        let document = self.documents.get(&size).or(self.fallback.as_ref()).cloned();
        self.tasks
            .lock()
            .map_err(|_| ReslideError::backend("layout", "task table poisoned"))?
            .insert(task_id.clone(), (document, self.pending_polls));
        Ok(task_id)
    }

    async fn poll(&self, task_id: &str) -> Result<LayoutPoll> {
        let mut tasks = self
            .tasks
            .lock()
            .map_err(|_| ReslideError::backend("layout", "task table poisoned"))?;
        let (document, remaining) = tasks
            .get_mut(task_id)
            .ok_or_else(|| ReslideError::backend("layout", format!("unknown task {task_id}")))?;
        if *remaining > 0 {
            *remaining -= 1;
            return Ok(LayoutPoll::Pending);
        }
        Ok(match document.take() {
            Some(doc) => LayoutPoll::Done(doc),
            None => LayoutPoll::Done(LayoutDocument::default()),
        })
    }
}

// -- OCR --------------------------------------------------------------------------

/// OCR backend answering from a table of canned lines.
#[derive(Debug, Default)]
pub struct StaticOcrBackend {
    lines: HashMap<(u32, u32), Vec<OcrLine>>,
    fallback: Vec<OcrLine>,
    calls: AtomicUsize,
}

impl StaticOcrBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_lines(mut self, size: (u32, u32), lines: Vec<OcrLine>) -> Self {
        self.lines.insert(size, lines);
        self
    }

    pub fn with_fallback(mut self, lines: Vec<OcrLine>) -> Self {
        self.fallback = lines;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

/// Convenience constructor for a recognised line.
pub fn ocr_line(text: &str, bbox: BBox, confidence: f64) -> OcrLine {
    OcrLine {
        text: text.to_string(),
        bbox,
        confidence: Some(confidence),
        chars: Vec::new(),
    }
}

#[async_trait]
impl OcrBackend for StaticOcrBackend {
    fn name(&self) -> &str {
        "static_ocr"
    }

    async fn recognize(&self, image: &DynamicImage, _options: &OcrOptions) -> Result<Vec<OcrLine>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .lines
            .get(&(image.width(), image.height()))
            .unwrap_or(&self.fallback)
            .clone())
    }
}

// -- Raster editing -------------------------------------------------------------------

/// Image-edit backend that returns the input unchanged, or a flat colour.
#[derive(Debug, Default)]
pub struct EchoEditBackend {
    flat: Option<[u8; 4]>,
    instructions: Mutex<Vec<String>>,
}

impl EchoEditBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every edit with a flat image of this colour.
    pub fn flat(colour: [u8; 4]) -> Self {
        Self {
            flat: Some(colour),
            ..Self::default()
        }
    }

    /// Instructions received so far.
    pub fn instructions(&self) -> Vec<String> {
        self.instructions.lock().map(|i| i.clone()).unwrap_or_default()
    }

    fn answer(&self, image: &DynamicImage) -> DynamicImage {
        match self.flat {
            Some(colour) => DynamicImage::ImageRgba8(RgbaImage::from_pixel(
                image.width(),
                image.height(),
                Rgba(colour),
            )),
            None => image.clone(),
        }
    }
}

#[async_trait]
impl ImageEditBackend for EchoEditBackend {
    fn name(&self) -> &str {
        "echo_edit"
    }

    async fn edit(
        &self,
        image: &DynamicImage,
        instruction: &str,
        _references: &[DynamicImage],
    ) -> Result<DynamicImage> {
        if let Ok(mut seen) = self.instructions.lock() {
            seen.push(instruction.to_string());
        }
        Ok(self.answer(image))
    }
}

#[async_trait]
impl MaskFillBackend for EchoEditBackend {
    fn name(&self) -> &str {
        "echo_edit"
    }

    async fn fill(&self, image: &DynamicImage, _mask: &GrayImage) -> Result<DynamicImage> {
        Ok(self.answer(image))
    }
}

#[async_trait]
impl RegionRemovalBackend for EchoEditBackend {
    fn name(&self) -> &str {
        "echo_edit"
    }

    async fn remove_regions(&self, image: &DynamicImage, _regions: &[BBox]) -> Result<DynamicImage> {
        Ok(self.answer(image))
    }
}

// -- Style ----------------------------------------------------------------------------

/// Style backend giving every queried element the same verdict.
#[derive(Debug, Clone, Default)]
pub struct StaticStyleBackend {
    template: StyleVerdict,
}

impl StaticStyleBackend {
    pub fn new(template: StyleVerdict) -> Self {
        Self { template }
    }
}

#[async_trait]
impl StyleBackend for StaticStyleBackend {
    fn name(&self) -> &str {
        "static_style"
    }

    async fn analyze(&self, _image: &DynamicImage, queries: &[StyleQuery]) -> Result<Vec<StyleVerdict>> {
        Ok(queries
            .iter()
            .map(|q| StyleVerdict {
                id: q.id.clone(),
                ..self.template.clone()
            })
            .collect())
    }
}

// -- Failure --------------------------------------------------------------------------

/// Backend that fails every call; used to exercise degraded paths.
#[derive(Debug, Clone)]
pub struct FailingBackend {
    message: String,
}

impl FailingBackend {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    fn error(&self, service: &str) -> ReslideError {
        tracing::warn!(service, "call routed to failing backend");
        ReslideError::BackendStatus {
            service: service.to_string(),
            status: 400,
            body: self.message.clone(),
        }
    }
}

#[async_trait]
impl LayoutBackend for FailingBackend {
    fn name(&self) -> &str {
        "failing"
    }

    async fn submit(&self, _file_name: &str, _image_bytes: Vec<u8>) -> Result<String> {
        Err(self.error("layout"))
    }

    async fn poll(&self, _task_id: &str) -> Result<LayoutPoll> {
        Err(self.error("layout"))
    }
}

#[async_trait]
impl OcrBackend for FailingBackend {
    fn name(&self) -> &str {
        "failing"
    }

    async fn recognize(&self, _image: &DynamicImage, _options: &OcrOptions) -> Result<Vec<OcrLine>> {
        Err(self.error("ocr"))
    }
}

#[async_trait]
impl ImageEditBackend for FailingBackend {
    fn name(&self) -> &str {
        "failing"
    }

    async fn edit(&self, _image: &DynamicImage, _instruction: &str, _references: &[DynamicImage]) -> Result<DynamicImage> {
        Err(self.error("image_edit"))
    }
}

#[async_trait]
impl RegionRemovalBackend for FailingBackend {
    fn name(&self) -> &str {
        "failing"
    }

    async fn remove_regions(&self, _image: &DynamicImage, _regions: &[BBox]) -> Result<DynamicImage> {
        Err(self.error("region_removal"))
    }
}

#[async_trait]
impl MaskFillBackend for FailingBackend {
    fn name(&self) -> &str {
        "failing"
    }

    async fn fill(&self, _image: &DynamicImage, _mask: &GrayImage) -> Result<DynamicImage> {
        Err(self.error("mask_fill"))
    }
}

#[async_trait]
impl StyleBackend for FailingBackend {
    fn name(&self) -> &str {
        "failing"
    }

    async fn analyze(&self, _image: &DynamicImage, _queries: &[StyleQuery]) -> Result<Vec<StyleVerdict>> {
        Err(self.error("style"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::png_bytes;

    fn blank(w: u32, h: u32) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::new(w, h))
    }

    #[tokio::test]
    async fn layout_answers_by_size_after_pending_polls() {
        let doc = LayoutDocument {
            page_width: 64.0,
            page_height: 32.0,
            ..Default::default()
        };
        let backend = StaticLayoutBackend::new()
            .with_document((64, 32), doc)
            .with_pending_polls(2);
        let task = backend.submit("page.png", png_bytes(&blank(64, 32)).unwrap()).await.unwrap();
        assert!(matches!(backend.poll(&task).await.unwrap(), LayoutPoll::Pending));
        assert!(matches!(backend.poll(&task).await.unwrap(), LayoutPoll::Pending));
        match backend.poll(&task).await.unwrap() {
            LayoutPoll::Done(doc) => assert_eq!(doc.page_width, 64.0),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(backend.submissions(), 1);
    }

    #[tokio::test]
    async fn ocr_falls_back_for_unknown_sizes() {
        let backend = StaticOcrBackend::new()
            .with_lines((10, 10), vec![ocr_line("a", BBox::new(0.0, 0.0, 5.0, 5.0), 0.9)])
            .with_fallback(vec![]);
        let opts = OcrOptions::default();
        assert_eq!(backend.recognize(&blank(10, 10), &opts).await.unwrap().len(), 1);
        assert!(backend.recognize(&blank(11, 10), &opts).await.unwrap().is_empty());
        assert_eq!(backend.calls(), 2);
    }

    #[tokio::test]
    async fn failing_backend_errors_permanently() {
        let backend = FailingBackend::new("offline");
        let err = OcrBackend::recognize(&backend, &blank(2, 2), &OcrOptions::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("offline"));
    }

    #[tokio::test]
    async fn flat_edit_replaces_every_pixel() {
        let backend = EchoEditBackend::flat([1, 2, 3, 255]);
        let out = backend.edit(&blank(3, 3), "clean", &[]).await.unwrap();
        assert!(out.to_rgba8().pixels().all(|p| p.0 == [1, 2, 3, 255]));
        assert_eq!(backend.instructions(), vec!["clean".to_string()]);
    }
}
