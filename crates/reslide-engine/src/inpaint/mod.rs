// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Inpaint providers: produce a clean background with detected elements
// removed.
//
// Every provider fails closed: `inpaint_regions` yields `None` when the
// backend errors, and the caller keeps the unmodified source.

pub mod generative;
pub mod hybrid;
pub mod mask;
pub mod region;

use async_trait::async_trait;
use image::{DynamicImage, GenericImageView, RgbaImage};
use reslide_core::error::Result;
use reslide_core::{BBox, ElementType};
use tracing::warn;

pub use generative::GenerativeInpaintProvider;
pub use hybrid::HybridInpaintProvider;
pub use mask::MaskInpaintProvider;
pub use region::RegionFillProvider;

/// Per-call inpainting options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InpaintOptions {
    /// Pixels added around every region before removal.
    pub expand_px: u32,
}

impl Default for InpaintOptions {
    fn default() -> Self {
        Self { expand_px: 4 }
    }
}

/// Removes regions from an image and synthesises what was behind them.
#[async_trait]
pub trait InpaintProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Inpaint `regions` (pixel boxes of `image`). `types` gives the element
    /// type of each region, for providers that care.
    async fn try_inpaint(
        &self,
        image: &DynamicImage,
        regions: &[BBox],
        types: &[ElementType],
        options: &InpaintOptions,
    ) -> Result<DynamicImage>;

    /// [`try_inpaint`](Self::try_inpaint), with failures logged and mapped to `None`.
    async fn inpaint_regions(
        &self,
        image: &DynamicImage,
        regions: &[BBox],
        types: &[ElementType],
        options: &InpaintOptions,
    ) -> Option<DynamicImage> {
        match self.try_inpaint(image, regions, types, options).await {
            Ok(clean) => Some(clean),
            Err(err) => {
                warn!(provider = self.name(), error = %err, "inpainting failed");
                None
            }
        }
    }
}

/// Grow every region by `px`, clip to the image, drop empty results.
pub fn expand_regions(regions: &[BBox], px: u32, width: u32, height: u32) -> Vec<BBox> {
    regions
        .iter()
        .map(|r| r.expand(px as f64).clamp_to(width as f64, height as f64))
        .filter(|r| !r.is_degenerate())
        .collect()
}

/// `source` everywhere except inside `regions`, where `edited` shows through.
/// `edited` is resized to the source's size first if needed.
pub fn composite_outside(source: &DynamicImage, edited: &DynamicImage, regions: &[BBox]) -> DynamicImage {
    let (w, h) = source.dimensions();
    let edited = if edited.dimensions() == (w, h) {
        edited.to_rgba8()
    } else {
        edited
            .resize_exact(w, h, image::imageops::FilterType::Lanczos3)
            .to_rgba8()
    };
    let mut out: RgbaImage = source.to_rgba8();
    for region in regions {
        let Some((x, y, rw, rh)) = region.to_pixel_rect(w, h) else {
            continue;
        };
        for py in y..y + rh {
            for px in x..x + rw {
                out.put_pixel(px, py, *edited.get_pixel(px, py));
            }
        }
    }
    DynamicImage::ImageRgba8(out)
}

/// Fraction of the image covered by the union of `regions`.
pub fn coverage(regions: &[BBox], width: u32, height: u32) -> f64 {
    if width == 0 || height == 0 {
        return 0.0;
    }
    let mask = reslide_backend::local_fill::mask_from_regions(width, height, regions);
    let covered = mask.pixels().filter(|p| p.0[0] > 0).count();
    covered as f64 / (width as f64 * height as f64)
}
