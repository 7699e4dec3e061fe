// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Region-fill inpainting through a rectangle-based removal backend.
//
// Removal services cap the image size they accept, so large images are
// downscaled (rectangles with them) before the call and the result is scaled
// back up. Only the removed rectangles are taken from the result; every other
// pixel is the untouched source.

use std::sync::Arc;

use async_trait::async_trait;
use image::{DynamicImage, GenericImageView};
use reslide_backend::RegionRemovalBackend;
use reslide_core::error::Result;
use reslide_core::{BBox, ElementType};
use reslide_document::ImageProcessor;
use tracing::{debug, instrument};

use super::{InpaintOptions, InpaintProvider, composite_outside, expand_regions};

/// Provider driving a [`RegionRemovalBackend`].
#[derive(Clone)]
pub struct RegionFillProvider {
    backend: Arc<dyn RegionRemovalBackend>,
    max_side: u32,
}

impl std::fmt::Debug for RegionFillProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegionFillProvider")
            .field("backend", &self.backend.name())
            .field("max_side", &self.max_side)
            .finish()
    }
}

impl RegionFillProvider {
    pub fn new(backend: Arc<dyn RegionRemovalBackend>, max_side: u32) -> Self {
        Self { backend, max_side }
    }

    /// Size ceiling in force: ours or the backend's, whichever is smaller.
    pub fn effective_max_side(&self) -> u32 {
        match self.backend.max_side() {
            Some(limit) if limit > 0 => limit.min(self.max_side),
            _ => self.max_side,
        }
    }

    /// Remove already-expanded `regions` from `image`.
    pub(crate) async fn remove(&self, image: &DynamicImage, regions: &[BBox]) -> Result<DynamicImage> {
        let (w, h) = image.dimensions();
        let limit = self.effective_max_side();
        if limit == 0 || w.max(h) <= limit {
            let repaired = self.backend.remove_regions(image, regions).await?;
            return Ok(composite_outside(image, &repaired, regions));
        }

        let small = ImageProcessor::from_dynamic(image.clone()).fit_within(limit);
        let (sw, sh) = small.dimensions();
        let (fx, fy) = (sw as f64 / w as f64, sh as f64 / h as f64);
        let scaled: Vec<BBox> = regions.iter().map(|r| r.scale(fx, fy)).collect();
        debug!(from_w = w, from_h = h, to_w = sw, to_h = sh, "downscaled for region removal");

        let repaired = self
            .backend
            .remove_regions(small.as_dynamic(), &scaled)
            .await?;
        let restored = ImageProcessor::from_dynamic(repaired)
            .resize_exact(w, h)
            .into_dynamic();
        Ok(composite_outside(image, &restored, regions))
    }
}

#[async_trait]
impl InpaintProvider for RegionFillProvider {
    fn name(&self) -> &str {
        "region"
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
        self.remove(image, &regions).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use reslide_backend::LocalFillBackend;

    use super::*;
    use crate::inpaint::test_support::{gradient, same_outside};

    /// Records the size it was called with, answers with the input.
    #[derive(Default)]
    struct SizeProbe {
        seen: Mutex<Vec<(u32, u32, Vec<BBox>)>>,
    }

    #[async_trait]
    impl RegionRemovalBackend for SizeProbe {
        fn name(&self) -> &str {
            "probe"
        }

        fn max_side(&self) -> Option<u32> {
            Some(100)
        }

        async fn remove_regions(&self, image: &DynamicImage, regions: &[BBox]) -> Result<DynamicImage> {
            self.seen
                .lock()
                .unwrap()
                .push((image.width(), image.height(), regions.to_vec()));
            Ok(image.clone())
        }
    }

    #[tokio::test]
    async fn large_images_are_bracketed_by_rescaling() {
        let probe = Arc::new(SizeProbe::default());
        let provider = RegionFillProvider::new(probe.clone(), 2048);
        assert_eq!(provider.effective_max_side(), 100);

        let image = gradient(400, 200);
        let regions = [BBox::new(40.0, 40.0, 80.0, 60.0)];
        let options = InpaintOptions { expand_px: 0 };
        let out = provider.try_inpaint(&image, &regions, &[], &options).await.unwrap();

        let seen = probe.seen.lock().unwrap();
        assert_eq!((seen[0].0, seen[0].1), (100, 50));
        assert!(seen[0].2[0].approx_eq(&BBox::new(10.0, 10.0, 20.0, 15.0), 1e-9));
        assert_eq!(out.dimensions(), (400, 200));
        assert!(same_outside(&image, &out, &regions));
    }

    #[tokio::test]
    async fn small_images_go_straight_through() {
        let provider = RegionFillProvider::new(Arc::new(LocalFillBackend::new()), 2048);
        let image = gradient(120, 80);
        let regions = [BBox::new(10.0, 10.0, 30.0, 20.0)];
        let out = provider
            .try_inpaint(&image, &regions, &[], &InpaintOptions::default())
            .await
            .unwrap();
        assert!(same_outside(&image, &out, &expand_regions(&regions, 4, 120, 80)));
    }
}
