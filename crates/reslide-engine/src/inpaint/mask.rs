// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Mask-based inpainting: rasterise the regions into a binary mask and let a
// fill backend synthesise strictly inside it.

use std::sync::Arc;

use async_trait::async_trait;
use image::{DynamicImage, GrayImage, Luma};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;
use reslide_backend::MaskFillBackend;
use reslide_core::error::Result;
use reslide_core::{BBox, ElementType};
use tracing::{debug, instrument};

use super::{InpaintOptions, InpaintProvider, composite_outside, expand_regions};

/// White-on-black mask of `regions` for a `width` x `height` image.
pub fn build_mask(width: u32, height: u32, regions: &[BBox]) -> GrayImage {
    let mut mask = GrayImage::new(width, height);
    for region in regions {
        if let Some((x, y, w, h)) = region.to_pixel_rect(width, height) {
            draw_filled_rect_mut(&mut mask, Rect::at(x as i32, y as i32).of_size(w, h), Luma([255]));
        }
    }
    mask
}

/// Provider driving a [`MaskFillBackend`].
#[derive(Clone)]
pub struct MaskInpaintProvider {
    backend: Arc<dyn MaskFillBackend>,
}

impl std::fmt::Debug for MaskInpaintProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MaskInpaintProvider")
            .field("backend", &self.backend.name())
            .finish()
    }
}

impl MaskInpaintProvider {
    pub fn new(backend: Arc<dyn MaskFillBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl InpaintProvider for MaskInpaintProvider {
    fn name(&self) -> &str {
        "mask"
    }

    #[instrument(skip_all, fields(regions = regions.len(), backend = self.backend.name()))]
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
        let mask = build_mask(image.width(), image.height(), &regions);
        let filled = self.backend.fill(image, &mask).await?;
        debug!("mask fill complete");
        Ok(composite_outside(image, &filled, &regions))
    }
}

#[cfg(test)]
mod tests {
    use image::{Rgba, RgbaImage};
    use reslide_backend::LocalFillBackend;
    use reslide_backend::stub::{EchoEditBackend, FailingBackend};

    use super::*;
    use crate::inpaint::test_support::{gradient, same_outside};

    #[test]
    fn mask_matches_regions() {
        let mask = build_mask(10, 10, &[BBox::new(2.0, 3.0, 5.0, 6.0)]);
        assert_eq!(mask.get_pixel(2, 3).0, [255]);
        assert_eq!(mask.get_pixel(4, 5).0, [255]);
        assert_eq!(mask.get_pixel(5, 6).0, [0]);
        assert_eq!(mask.pixels().filter(|p| p.0[0] == 255).count(), 9);
    }

    #[tokio::test]
    async fn text_on_flat_background_is_removed() {
        let mut img = RgbaImage::from_pixel(40, 30, Rgba([250, 250, 250, 255]));
        for x in 10..20 {
            img.put_pixel(x, 12, Rgba([0, 0, 0, 255]));
        }
        let image = DynamicImage::ImageRgba8(img);
        let provider = MaskInpaintProvider::new(Arc::new(LocalFillBackend::new()));
        let clean = provider
            .inpaint_regions(
                &image,
                &[BBox::new(9.0, 11.0, 21.0, 14.0)],
                &[ElementType::Text],
                &InpaintOptions::default(),
            )
            .await
            .unwrap();
        assert!(clean.to_rgba8().pixels().all(|p| p.0 == [250, 250, 250, 255]));
    }

    #[tokio::test]
    async fn backend_changes_outside_are_discarded() {
        let image = gradient(50, 50);
        let regions = [BBox::new(5.0, 5.0, 15.0, 15.0)];
        let provider = MaskInpaintProvider::new(Arc::new(EchoEditBackend::flat([0, 0, 0, 255])));
        let options = InpaintOptions { expand_px: 2 };
        let clean = provider.try_inpaint(&image, &regions, &[], &options).await.unwrap();
        assert!(same_outside(&image, &clean, &expand_regions(&regions, 2, 50, 50)));
    }

    #[tokio::test]
    async fn failure_is_none() {
        let provider = MaskInpaintProvider::new(Arc::new(FailingBackend::new("down")));
        let out = provider
            .inpaint_regions(&gradient(8, 8), &[BBox::new(1.0, 1.0, 4.0, 4.0)], &[], &InpaintOptions::default())
            .await;
        assert!(out.is_none());
    }
}
