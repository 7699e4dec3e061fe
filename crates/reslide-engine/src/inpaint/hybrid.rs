// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Hybrid inpainting: precise region removal, then an optional generative pass
// that repairs the touched areas.
//
// The enhancement request carries the original as a reference and names the
// touched regions as percentages of the image. Its output is only accepted
// inside those regions, and a failed enhancement keeps the region-fill result.

use std::fmt::Write as _;
use std::sync::Arc;

use async_trait::async_trait;
use image::DynamicImage;
use reslide_backend::ImageEditBackend;
use reslide_core::error::Result;
use reslide_core::{BBox, ElementType};
use tracing::{info, instrument, warn};

use super::{InpaintOptions, InpaintProvider, RegionFillProvider, composite_outside, expand_regions};

const ENHANCE_PREAMBLE: &str = "This image had text and icons removed from the regions listed below. \
     Improve the quality of those regions only: remove any leftover traces and blend them with their \
     surroundings. Do not change anything outside them. The second image is the original for reference.";

/// Enhancement instruction naming `regions` as percentages of a
/// `width` x `height` image.
pub fn enhancement_instruction(regions: &[BBox], width: u32, height: u32) -> String {
    let (w, h) = (width.max(1) as f64, height.max(1) as f64);
    let mut text = String::from(ENHANCE_PREAMBLE);
    text.push_str("\nRegions:");
    for r in regions {
        let _ = write!(
            text,
            "\n- left {:.1}%, top {:.1}%, width {:.1}%, height {:.1}%",
            r.x0 / w * 100.0,
            r.y0 / h * 100.0,
            r.width() / w * 100.0,
            r.height() / h * 100.0
        );
    }
    text
}

/// Region fill followed by optional generative enhancement.
#[derive(Clone)]
pub struct HybridInpaintProvider {
    region: RegionFillProvider,
    enhancer: Option<Arc<dyn ImageEditBackend>>,
    enhance: bool,
}

impl std::fmt::Debug for HybridInpaintProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HybridInpaintProvider")
            .field("region", &self.region)
            .field("enhancer", &self.enhancer.as_ref().map(|e| e.name().to_string()))
            .field("enhance", &self.enhance)
            .finish()
    }
}

impl HybridInpaintProvider {
    pub fn new(region: RegionFillProvider) -> Self {
        Self {
            region,
            enhancer: None,
            enhance: false,
        }
    }

    /// Enable the enhancement pass through `backend`.
    pub fn with_enhancer(mut self, backend: Arc<dyn ImageEditBackend>, enabled: bool) -> Self {
        self.enhancer = Some(backend);
        self.enhance = enabled;
        self
    }
}

#[async_trait]
impl InpaintProvider for HybridInpaintProvider {
    fn name(&self) -> &str {
        "hybrid"
    }

    #[instrument(skip_all, fields(regions = regions.len(), enhance = self.enhance))]
    async fn try_inpaint(
        &self,
        image: &DynamicImage,
        regions: &[BBox],
        _types: &[ElementType],
        options: &InpaintOptions,
    ) -> Result<DynamicImage> {
        let regions = expand_regions(regions, options.expand_px, image.width(), image.height());
        if regions.is_empty() {
            return Ok(image.clone());
        }
        let filled = self.region.remove(image, &regions).await?;

        let Some(enhancer) = self.enhancer.as_ref().filter(|_| self.enhance) else {
            return Ok(filled);
        };
        let instruction = enhancement_instruction(&regions, image.width(), image.height());
        match enhancer
            .edit(&filled, &instruction, std::slice::from_ref(image))
            .await
        {
            Ok(enhanced) => {
                info!("enhancement pass applied");
                Ok(composite_outside(&filled, &enhanced, &regions))
            }
            Err(err) => {
                warn!(error = %err, "enhancement failed, keeping region-fill result");
                Ok(filled)
            }
        }
    }
}
