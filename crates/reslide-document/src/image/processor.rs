// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image processor — load, crop by bounding box, rescale, and encode rasters.
// Operates on in-memory images using the `image` crate.

use std::path::Path;

use image::{DynamicImage, ImageFormat};
use reslide_core::BBox;
use reslide_core::error::{ReslideError, Result};
use tracing::{debug, info, instrument};

/// Image processing pipeline operating on a single in-memory image.
///
/// Each transformation consumes `self` and returns a new `ImageProcessor`
/// wrapping the result, enabling method chaining.
///
/// ```ignore
/// let crop = ImageProcessor::open("slide.png")?
///     .crop_bbox(&BBox::new(1000.0, 200.0, 1900.0, 1000.0))?
///     .fit_within(2048);
/// crop.save("chart.png")?;
/// ```
#[derive(Debug, Clone)]
pub struct ImageProcessor {
    image: DynamicImage,
}

impl ImageProcessor {
    // -- Construction ---------------------------------------------------------

    /// Load an image from a file path.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let img = image::open(path).map_err(|err| ReslideError::ImageLoad {
            path: path.display().to_string(),
            detail: err.to_string(),
        })?;
        info!(width = img.width(), height = img.height(), "Image loaded");
        Ok(Self { image: img })
    }

    /// Create a processor from raw encoded bytes (JPEG, PNG, etc.).
    #[instrument(skip(data), fields(data_len = data.len()))]
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let img = image::load_from_memory(data)
            .map_err(|err| ReslideError::Image(format!("failed to decode image: {err}")))?;
        debug!(width = img.width(), height = img.height(), "Image decoded from bytes");
        Ok(Self { image: img })
    }

    /// Wrap an already-decoded `DynamicImage`.
    pub fn from_dynamic(image: DynamicImage) -> Self {
        Self { image }
    }

    // -- Accessors ------------------------------------------------------------

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.image.width(), self.image.height())
    }

    pub fn as_dynamic(&self) -> &DynamicImage {
        &self.image
    }

    pub fn into_dynamic(self) -> DynamicImage {
        self.image
    }

    // -- Transformations (consume self, return new Self) -----------------------

    /// Crop the pixels covered by `bbox`, rounded outward and clipped to the
    /// image. An empty clipped region is an error.
    #[instrument(skip(self), fields(x0 = bbox.x0, y0 = bbox.y0, x1 = bbox.x1, y1 = bbox.y1))]
    pub fn crop_bbox(self, bbox: &BBox) -> Result<Self> {
        let (x, y, w, h) = bbox
            .to_pixel_rect(self.image.width(), self.image.height())
            .ok_or_else(|| {
                ReslideError::Image(format!(
                    "crop region ({:.1},{:.1},{:.1},{:.1}) lies outside the {}x{} image",
                    bbox.x0,
                    bbox.y0,
                    bbox.x1,
                    bbox.y1,
                    self.image.width(),
                    self.image.height()
                ))
            })?;
        debug!(x, y, w, h, "Cropping image");
        Ok(Self {
            image: self.image.crop_imm(x, y, w, h),
        })
    }

    /// Downscale so the longer side is at most `max_side`, preserving aspect
    /// ratio. Images already small enough pass through untouched.
    pub fn fit_within(self, max_side: u32) -> Self {
        let (w, h) = self.dimensions();
        if w.max(h) <= max_side || max_side == 0 {
            return self;
        }
        info!(from_w = w, from_h = h, max_side, "Downscaling image");
        Self {
            image: self
                .image
                .resize(max_side, max_side, image::imageops::FilterType::Lanczos3),
        }
    }

    /// Resize to exactly `width` x `height`, ignoring aspect ratio.
    pub fn resize_exact(self, width: u32, height: u32) -> Self {
        if self.dimensions() == (width, height) {
            return self;
        }
        Self {
            image: self
                .image
                .resize_exact(width, height, image::imageops::FilterType::Lanczos3),
        }
    }

    // -- Output ---------------------------------------------------------------

    /// Encode the current image as PNG bytes.
    pub fn to_png_bytes(&self) -> Result<Vec<u8>> {
        encode_png(&self.image)
    }

    /// Write the image to a file. The format is inferred from the extension;
    /// parent directories are created as needed.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        self.image.save(path).map_err(|err| {
            ReslideError::Image(format!("failed to save image to {}: {err}", path.display()))
        })
    }
}

/// Encode a `DynamicImage` as PNG.
pub fn encode_png(image: &DynamicImage) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    let mut cursor = std::io::Cursor::new(&mut buffer);
    image
        .write_to(&mut cursor, ImageFormat::Png)
        .map_err(|err| ReslideError::Image(format!("image encoding failed: {err}")))?;
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use image::{Rgba, RgbaImage};

    use super::*;

    fn sample(w: u32, h: u32) -> ImageProcessor {
        let img = RgbaImage::from_fn(w, h, |x, y| Rgba([x as u8, y as u8, 0, 255]));
        ImageProcessor::from_dynamic(DynamicImage::ImageRgba8(img))
    }

    #[test]
    fn crop_rounds_outward() {
        let crop = sample(100, 50).crop_bbox(&BBox::new(10.2, 5.5, 20.7, 15.0)).unwrap();
        assert_eq!(crop.dimensions(), (11, 10));
        assert_eq!(crop.as_dynamic().to_rgba8().get_pixel(0, 0).0, [10, 5, 0, 255]);
    }

    #[test]
    fn crop_outside_image_fails() {
        assert!(sample(10, 10).crop_bbox(&BBox::new(20.0, 20.0, 30.0, 30.0)).is_err());
    }

    #[test]
    fn fit_within_preserves_aspect() {
        let fitted = sample(400, 100).fit_within(200);
        assert_eq!(fitted.dimensions(), (200, 50));
        let untouched = sample(100, 50).fit_within(200);
        assert_eq!(untouched.dimensions(), (100, 50));
    }

    #[test]
    fn missing_file_is_image_load_error() {
        let err = ImageProcessor::open("/definitely/not/here.png").unwrap_err();
        assert!(matches!(err, ReslideError::ImageLoad { .. }));
    }

    #[test]
    fn save_then_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.png");
        sample(8, 4).save(&path).unwrap();
        assert_eq!(ImageProcessor::open(&path).unwrap().dimensions(), (8, 4));
    }
}
