// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Offline style inference from the pixels of each text box.
//
// The background colour is the per-channel median of the crop's border. Ink
// is every pixel whose luma differs from the background's by more than
// `INK_CONTRAST`. From the ink we read:
//
// - colour: the mean ink colour;
// - weight: average horizontal stroke width relative to the box height;
// - alignment: the left/right margins left by the ink.
//
// Italic and underline are not detected.

use async_trait::async_trait;
use image::{DynamicImage, Rgb, RgbImage};
use reslide_core::error::Result;
use reslide_core::style::rgb_hex;
use reslide_core::{Alignment, TextStyle};
use tracing::{debug, instrument};

use super::{StyleTarget, TextAttributeExtractor};

/// Luma difference from the background for a pixel to count as ink.
pub const INK_CONTRAST: i32 = 60;

/// Stroke width / box height above which text is taken to be bold.
const BOLD_STROKE_RATIO: f64 = 0.11;

/// Margin difference (fraction of box width) within which ink is centred.
const CENTRE_TOLERANCE: f64 = 0.1;

/// Local [`TextAttributeExtractor`]; needs no backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct PixelStyleExtractor;

impl PixelStyleExtractor {
    pub fn new() -> Self {
        Self
    }
}

fn luma(p: &Rgb<u8>) -> i32 {
    (299 * p.0[0] as i32 + 587 * p.0[1] as i32 + 114 * p.0[2] as i32) / 1000
}

fn border_median(crop: &RgbImage) -> Rgb<u8> {
    let (w, h) = crop.dimensions();
    let mut channels: [Vec<u8>; 3] = Default::default();
    for (x, y, p) in crop.enumerate_pixels() {
        if x == 0 || y == 0 || x + 1 == w || y + 1 == h {
            for (c, v) in channels.iter_mut().zip(p.0) {
                c.push(v);
            }
        }
    }
    let mut out = [255u8; 3];
    for (slot, mut values) in out.iter_mut().zip(channels) {
        if values.is_empty() {
            continue;
        }
        values.sort_unstable();
        *slot = values[values.len() / 2];
    }
    Rgb(out)
}

/// Style of the text drawn in `crop`, or `None` when it holds no ink.
pub fn analyse_crop(crop: &RgbImage) -> Option<TextStyle> {
    let (w, h) = crop.dimensions();
    if w < 3 || h < 3 {
        return None;
    }
    let background = luma(&border_median(crop));

    let mut sum = [0u64; 3];
    let mut ink = 0u64;
    let (mut min_x, mut max_x) = (u32::MAX, 0u32);
    let mut runs = 0u64;
    for y in 0..h {
        let mut in_run = false;
        for x in 0..w {
            let p = crop.get_pixel(x, y);
            let is_ink = (luma(p) - background).abs() > INK_CONTRAST;
            if is_ink {
                ink += 1;
                for (s, v) in sum.iter_mut().zip(p.0) {
                    *s += v as u64;
                }
                min_x = min_x.min(x);
                max_x = max_x.max(x);
                if !in_run {
                    runs += 1;
                }
            }
            in_run = is_ink;
        }
    }
    if ink == 0 {
        return None;
    }

    let colour = sum.map(|s| (s / ink) as u8);
    let stroke = ink as f64 / runs.max(1) as f64;
    let bold = stroke / h as f64 > BOLD_STROKE_RATIO;

    let left = min_x as f64;
    let right = (w - 1 - max_x) as f64;
    let alignment = if (left - right).abs() <= CENTRE_TOLERANCE * w as f64 && left > CENTRE_TOLERANCE * w as f64 {
        Alignment::Center
    } else if left <= right {
        Alignment::Left
    } else {
        Alignment::Right
    };

    Some(TextStyle {
        color_hex: rgb_hex(colour),
        bold,
        alignment,
        ..TextStyle::default()
    })
}

#[async_trait]
impl TextAttributeExtractor for PixelStyleExtractor {
    fn name(&self) -> &str {
        "pixel"
    }

    #[instrument(skip_all, fields(targets = targets.len()))]
    async fn extract_styles(
        &self,
        image: &DynamicImage,
        targets: &[StyleTarget],
    ) -> Result<Vec<(String, TextStyle)>> {
        let rgb = image.to_rgb8();
        let (w, h) = rgb.dimensions();
        let mut styles = Vec::new();
        for target in targets {
            let Some((x, y, cw, ch)) = target.bbox.to_pixel_rect(w, h) else {
                continue;
            };
            let crop = image::imageops::crop_imm(&rgb, x, y, cw, ch).to_image();
            if let Some(style) = analyse_crop(&crop) {
                styles.push((target.id.clone(), style));
            }
        }
        debug!(answered = styles.len(), "pixel styles inferred");
        Ok(styles)
    }
}

#[cfg(test)]
mod tests {
    use reslide_core::BBox;

    use super::*;

    /// White 200x40 box with vertical strokes of `stroke` px every 8 px
    /// between `from` and `to`.
    fn strokes(from: u32, to: u32, stroke: u32, ink: [u8; 3]) -> RgbImage {
        let mut img = RgbImage::from_pixel(200, 40, Rgb([255, 255, 255]));
        let mut x = from;
        while x + stroke <= to {
            for dx in 0..stroke {
                for y in 10..30 {
                    img.put_pixel(x + dx, y, Rgb(ink));
                }
            }
            x += 8;
        }
        img
    }

    #[test]
    fn centred_thin_black_text() {
        let style = analyse_crop(&strokes(70, 130, 2, [0, 0, 0])).unwrap();
        assert_eq!(style.color_hex, "#000000");
        assert_eq!(style.alignment, Alignment::Center);
        assert!(!style.bold);
    }

    #[test]
    fn left_aligned_bold_red_text() {
        let style = analyse_crop(&strokes(4, 80, 6, [200, 0, 0])).unwrap();
        assert_eq!(style.color_hex, "#C80000");
        assert_eq!(style.alignment, Alignment::Left);
        assert!(style.bold);
    }

    #[test]
    fn right_aligned_text() {
        let style = analyse_crop(&strokes(120, 196, 2, [0, 0, 0])).unwrap();
        assert_eq!(style.alignment, Alignment::Right);
    }

    #[test]
    fn blank_crop_has_no_style() {
        assert!(analyse_crop(&RgbImage::from_pixel(50, 20, Rgb([240, 240, 240]))).is_none());
    }

    #[tokio::test]
    async fn targets_are_cropped_from_the_image() {
        let mut page = RgbImage::from_pixel(400, 100, Rgb([255, 255, 255]));
        let line = strokes(4, 80, 2, [0, 0, 160]);
        image::imageops::replace(&mut page, &line, 100, 30);
        let image = DynamicImage::ImageRgb8(page);
        let targets = [
            StyleTarget {
                id: "line".into(),
                text: None,
                bbox: BBox::new(100.0, 30.0, 300.0, 70.0),
            },
            StyleTarget {
                id: "outside".into(),
                text: None,
                bbox: BBox::new(500.0, 0.0, 600.0, 10.0),
            },
        ];
        let styles = PixelStyleExtractor::new().extract_styles(&image, &targets).await.unwrap();
        assert_eq!(styles.len(), 1);
        assert_eq!(styles[0].1.color_hex, "#0000A0");
    }
}
