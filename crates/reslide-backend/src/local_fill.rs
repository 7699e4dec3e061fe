// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Offline inpainting by onion-peel diffusion.
//
// Masked pixels are filled layer by layer from the outside in: each pass
// assigns every masked pixel that touches a known pixel the mean of its known
// 8-neighbours, then treats it as known for the next pass. Flat backgrounds
// come back exactly; gradients come back smooth. No network is involved.

use std::collections::VecDeque;

use async_trait::async_trait;
use image::{DynamicImage, GrayImage, Rgba, RgbaImage};
use reslide_core::BBox;
use reslide_core::error::{ReslideError, Result};
use tracing::{debug, instrument};

use crate::traits::{MaskFillBackend, RegionRemovalBackend};

/// Colour used when the whole image is masked and nothing can be diffused.
const EMPTY_FILL: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Local mask filler; also serves rectangle removal by rasterising the rects.
#[derive(Debug, Clone, Default)]
pub struct LocalFillBackend;

impl LocalFillBackend {
    pub fn new() -> Self {
        Self
    }
}

/// Rasterise rectangles into a white-on-black mask.
pub fn mask_from_regions(width: u32, height: u32, regions: &[BBox]) -> GrayImage {
    let mut mask = GrayImage::new(width, height);
    for region in regions {
        if let Some((x, y, w, h)) = region.to_pixel_rect(width, height) {
            for py in y..y + h {
                for px in x..x + w {
                    mask.put_pixel(px, py, image::Luma([255]));
                }
            }
        }
    }
    mask
}

/// Fill every pixel whose mask value is non-zero.
pub fn onion_fill(image: &RgbaImage, mask: &GrayImage) -> RgbaImage {
    let (w, h) = image.dimensions();
    let mut out = image.clone();
    if mask.dimensions() != (w, h) || w == 0 || h == 0 {
        return out;
    }
    let idx = |x: u32, y: u32| (y * w + x) as usize;
    let mut known: Vec<bool> = mask.pixels().map(|p| p.0[0] == 0).collect();
    if known.iter().all(|k| *k) {
        return out;
    }
    if !known.iter().any(|k| *k) {
        for (x, y, _) in mask.enumerate_pixels() {
            out.put_pixel(x, y, EMPTY_FILL);
        }
        return out;
    }

    let neighbours = |x: u32, y: u32| {
        let mut n = Vec::with_capacity(8);
        for dy in -1i64..=1 {
            for dx in -1i64..=1 {
                if dx == 0 && dy == 0 {
                    continue;
                }
                let nx = x as i64 + dx;
                let ny = y as i64 + dy;
                if nx >= 0 && ny >= 0 && nx < w as i64 && ny < h as i64 {
                    n.push((nx as u32, ny as u32));
                }
            }
        }
        n
    };

    let mut queued = vec![false; known.len()];
    let mut frontier: VecDeque<(u32, u32)> = VecDeque::new();
    for y in 0..h {
        for x in 0..w {
            if !known[idx(x, y)] && neighbours(x, y).iter().any(|&(nx, ny)| known[idx(nx, ny)]) {
                queued[idx(x, y)] = true;
                frontier.push_back((x, y));
            }
        }
    }

    let mut layers = 0;
    while !frontier.is_empty() {
        layers += 1;
        let layer: Vec<(u32, u32)> = frontier.drain(..).collect();
        let mut filled = Vec::with_capacity(layer.len());
        for &(x, y) in &layer {
            let mut sum = [0u32; 4];
            let mut count = 0u32;
            for (nx, ny) in neighbours(x, y) {
                if known[idx(nx, ny)] {
                    let p = out.get_pixel(nx, ny).0;
                    for c in 0..4 {
                        sum[c] += p[c] as u32;
                    }
                    count += 1;
                }
            }
            if count > 0 {
                let mean = sum.map(|s| ((s + count / 2) / count) as u8);
                filled.push((x, y, Rgba(mean)));
            }
        }
        for &(x, y, colour) in &filled {
            out.put_pixel(x, y, colour);
            known[idx(x, y)] = true;
        }
        for &(x, y, _) in &filled {
            for (nx, ny) in neighbours(x, y) {
                let i = idx(nx, ny);
                if !known[i] && !queued[i] {
                    queued[i] = true;
                    frontier.push_back((nx, ny));
                }
            }
        }
    }
    debug!(layers, "onion fill complete");
    out
}

async fn fill_blocking(image: &DynamicImage, mask: GrayImage) -> Result<DynamicImage> {
    let rgba = image.to_rgba8();
    let filled = tokio::task::spawn_blocking(move || onion_fill(&rgba, &mask))
        .await
        .map_err(|e| ReslideError::backend("local_fill", format!("fill task panicked: {e}")))?;
    Ok(DynamicImage::ImageRgba8(filled))
}

#[async_trait]
impl MaskFillBackend for LocalFillBackend {
    fn name(&self) -> &str {
        "local_fill"
    }

    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    async fn fill(&self, image: &DynamicImage, mask: &GrayImage) -> Result<DynamicImage> {
        if mask.dimensions() != (image.width(), image.height()) {
            return Err(ReslideError::Image(format!(
                "mask is {}x{} but image is {}x{}",
                mask.width(),
                mask.height(),
                image.width(),
                image.height()
            )));
        }
        fill_blocking(image, mask.clone()).await
    }
}

#[async_trait]
impl RegionRemovalBackend for LocalFillBackend {
    fn name(&self) -> &str {
        "local_fill"
    }

    #[instrument(skip_all, fields(regions = regions.len()))]
    async fn remove_regions(&self, image: &DynamicImage, regions: &[BBox]) -> Result<DynamicImage> {
        let mask = mask_from_regions(image.width(), image.height(), regions);
        fill_blocking(image, mask).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat(w: u32, h: u32, colour: [u8; 4]) -> RgbaImage {
        RgbaImage::from_pixel(w, h, Rgba(colour))
    }

    #[test]
    fn flat_background_is_restored_exactly() {
        let mut img = flat(20, 20, [40, 80, 120, 255]);
        for y in 5..12 {
            for x in 6..14 {
                img.put_pixel(x, y, Rgba([0, 0, 0, 255]));
            }
        }
        let mask = mask_from_regions(20, 20, &[BBox::new(6.0, 5.0, 14.0, 12.0)]);
        let out = onion_fill(&img, &mask);
        assert!(out.pixels().all(|p| p.0 == [40, 80, 120, 255]));
    }

    #[test]
    fn unmasked_pixels_are_untouched() {
        let mut img = flat(10, 10, [10, 10, 10, 255]);
        img.put_pixel(0, 0, Rgba([200, 0, 0, 255]));
        let mask = mask_from_regions(10, 10, &[BBox::new(4.0, 4.0, 6.0, 6.0)]);
        let out = onion_fill(&img, &mask);
        assert_eq!(out.get_pixel(0, 0).0, [200, 0, 0, 255]);
        for (x, y, p) in img.enumerate_pixels() {
            if mask.get_pixel(x, y).0[0] == 0 {
                assert_eq!(out.get_pixel(x, y), p);
            }
        }
    }

    #[test]
    fn fully_masked_image_becomes_white() {
        let img = flat(4, 4, [0, 0, 0, 255]);
        let mask = mask_from_regions(4, 4, &[BBox::full(4, 4)]);
        let out = onion_fill(&img, &mask);
        assert!(out.pixels().all(|p| *p == EMPTY_FILL));
    }

    #[tokio::test]
    async fn region_removal_keeps_dimensions() {
        let img = DynamicImage::ImageRgba8(flat(32, 16, [9, 9, 9, 255]));
        let out = LocalFillBackend::new()
            .remove_regions(&img, &[BBox::new(2.0, 2.0, 10.0, 10.0)])
            .await
            .unwrap();
        assert_eq!((out.width(), out.height()), (32, 16));
    }

    #[tokio::test]
    async fn mismatched_mask_is_rejected() {
        let img = DynamicImage::ImageRgba8(flat(8, 8, [0, 0, 0, 255]));
        let mask = GrayImage::new(4, 4);
        assert!(LocalFillBackend::new().fill(&img, &mask).await.is_err());
    }
}
