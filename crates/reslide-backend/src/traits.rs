// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Backend trait definitions and the wire types they exchange.
//
// Every external collaborator sits behind one of these traits so the engine can
// be driven by HTTP clients, offline implementations, or deterministic stubs.

use std::collections::BTreeMap;

use async_trait::async_trait;
use image::{DynamicImage, GrayImage};
use reslide_core::BBox;
use reslide_core::error::Result;
use serde::{Deserialize, Serialize};

// -- Layout analysis ------------------------------------------------------------

/// Outcome of polling a submitted layout task.
#[derive(Debug, Clone)]
pub enum LayoutPoll {
    /// Still queued or running.
    Pending,
    /// Finished; the analysed page.
    Done(LayoutDocument),
    /// The backend gave up on the task.
    Failed(String),
}

/// Region structure of one analysed page.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LayoutDocument {
    /// Page width in the backend's coordinate space.
    pub page_width: f64,
    /// Page height in the backend's coordinate space.
    pub page_height: f64,
    #[serde(default)]
    pub blocks: Vec<LayoutBlock>,
    /// Embedded rasters keyed by the names spans refer to.
    #[serde(skip)]
    pub assets: BTreeMap<String, Vec<u8>>,
}

/// One detected region, possibly with nested sub-regions
/// (e.g. an image body and its caption).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LayoutBlock {
    #[serde(rename = "type")]
    pub kind: String,
    pub bbox: [f64; 4],
    #[serde(default)]
    pub lines: Vec<LayoutLine>,
    #[serde(default)]
    pub blocks: Vec<LayoutBlock>,
    #[serde(default)]
    pub score: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LayoutLine {
    #[serde(default)]
    pub spans: Vec<LayoutSpan>,
}

/// Smallest unit of a layout line: a run of text or an embedded picture.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LayoutSpan {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub content: Option<String>,
    /// Name of an entry in [`LayoutDocument::assets`].
    #[serde(default)]
    pub image_path: Option<String>,
    /// Table markup when the span is a table body.
    #[serde(default)]
    pub html: Option<String>,
}

impl LayoutSpan {
    pub fn is_image(&self) -> bool {
        matches!(self.kind.as_str(), "image" | "table" | "chart") && self.image_path.is_some()
    }

    pub fn is_text(&self) -> bool {
        matches!(self.kind.as_str(), "text" | "inline_equation")
            && self.content.as_deref().is_some_and(|c| !c.trim().is_empty())
    }
}

/// Batch layout-analysis service: submit a page, poll until it is analysed.
#[async_trait]
pub trait LayoutBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Submit an encoded image; returns the task id.
    async fn submit(&self, file_name: &str, image_bytes: Vec<u8>) -> Result<String>;

    /// Query a submitted task.
    async fn poll(&self, task_id: &str) -> Result<LayoutPoll>;
}

// -- OCR --------------------------------------------------------------------------

/// Options forwarded to the OCR service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OcrOptions {
    pub language: String,
    /// Ask for per-character boxes.
    pub char_boxes: bool,
}

impl Default for OcrOptions {
    fn default() -> Self {
        Self {
            language: "auto".into(),
            char_boxes: false,
        }
    }
}

/// One recognised text line in image pixel space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrLine {
    pub text: String,
    pub bbox: BBox,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub chars: Vec<OcrChar>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrChar {
    #[serde(rename = "char")]
    pub text: String,
    pub bbox: BBox,
}

/// Line-level text recognition.
#[async_trait]
pub trait OcrBackend: Send + Sync {
    fn name(&self) -> &str;

    async fn recognize(&self, image: &DynamicImage, options: &OcrOptions) -> Result<Vec<OcrLine>>;
}

// -- Raster editing -----------------------------------------------------------------

/// Generative image editing: image + instruction (+ reference images) → new image.
#[async_trait]
pub trait ImageEditBackend: Send + Sync {
    fn name(&self) -> &str;

    async fn edit(
        &self,
        image: &DynamicImage,
        instruction: &str,
        references: &[DynamicImage],
    ) -> Result<DynamicImage>;
}

/// Rectangle-based object removal.
#[async_trait]
pub trait RegionRemovalBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Largest side (px) the service accepts, if limited.
    fn max_side(&self) -> Option<u32> {
        None
    }

    async fn remove_regions(&self, image: &DynamicImage, regions: &[BBox]) -> Result<DynamicImage>;
}

/// Mask-based inpainting: white mask pixels are synthesised.
#[async_trait]
pub trait MaskFillBackend: Send + Sync {
    fn name(&self) -> &str;

    async fn fill(&self, image: &DynamicImage, mask: &GrayImage) -> Result<DynamicImage>;
}

// -- Text style -------------------------------------------------------------------

/// A text element whose style is requested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyleQuery {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    pub bbox: BBox,
}

/// Style verdict for one queried element. Absent fields mean "unknown".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StyleVerdict {
    pub id: String,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub bold: Option<bool>,
    #[serde(default)]
    pub italic: Option<bool>,
    #[serde(default)]
    pub underline: Option<bool>,
    #[serde(default)]
    pub alignment: Option<String>,
    /// Per-segment styles when the text mixes colours or slants.
    #[serde(default)]
    pub runs: Vec<RunVerdict>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunVerdict {
    pub text: String,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub bold: Option<bool>,
    #[serde(default)]
    pub italic: Option<bool>,
}

/// Vision-capable style inference.
#[async_trait]
pub trait StyleBackend: Send + Sync {
    fn name(&self) -> &str;

    async fn analyze(&self, image: &DynamicImage, queries: &[StyleQuery]) -> Result<Vec<StyleVerdict>>;
}
