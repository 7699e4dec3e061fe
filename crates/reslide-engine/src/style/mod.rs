// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Text style inference: colour, weight, slant, underline, and alignment of
// the text elements of one image.

pub mod pixel;
pub mod vision;

use async_trait::async_trait;
use image::DynamicImage;
use reslide_core::error::Result;
use reslide_core::{BBox, TextStyle};

pub use pixel::PixelStyleExtractor;
pub use vision::VisionStyleExtractor;

/// A text element whose style is wanted. `bbox` is in the pixel space of the
/// image handed to the extractor.
#[derive(Debug, Clone, PartialEq)]
pub struct StyleTarget {
    pub id: String,
    pub text: Option<String>,
    pub bbox: BBox,
}

/// Infers [`TextStyle`]s for text elements of one image.
#[async_trait]
pub trait TextAttributeExtractor: Send + Sync {
    fn name(&self) -> &str;

    /// Styles keyed by target id. Targets the extractor has no answer for are
    /// left out; the caller gives them the default style.
    async fn extract_styles(
        &self,
        image: &DynamicImage,
        targets: &[StyleTarget],
    ) -> Result<Vec<(String, TextStyle)>>;
}
