// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PNG / base64 conversions for images sent over JSON.

use std::io::Cursor;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use image::{DynamicImage, GrayImage, ImageFormat};
use reslide_core::error::{ReslideError, Result};

/// Encode an image as PNG bytes.
pub fn png_bytes(image: &DynamicImage) -> Result<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    image
        .write_to(&mut buf, ImageFormat::Png)
        .map_err(|e| ReslideError::Image(format!("PNG encode failed: {e}")))?;
    Ok(buf.into_inner())
}

/// Encode an image as base64 PNG.
pub fn png_base64(image: &DynamicImage) -> Result<String> {
    Ok(STANDARD.encode(png_bytes(image)?))
}

/// Encode a mask as base64 PNG.
pub fn mask_base64(mask: &GrayImage) -> Result<String> {
    png_base64(&DynamicImage::ImageLuma8(mask.clone()))
}

/// `data:` URL for vision chat payloads.
pub fn png_data_url(image: &DynamicImage) -> Result<String> {
    Ok(format!("data:image/png;base64,{}", png_base64(image)?))
}

/// Decode a base64 image (plain or `data:` URL) of any supported format.
pub fn decode_base64_image(service: &str, encoded: &str) -> Result<DynamicImage> {
    let payload = match encoded.split_once("base64,") {
        Some((_, rest)) => rest,
        None => encoded,
    };
    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|e| ReslideError::backend(service, format!("invalid base64 image: {e}")))?;
    image::load_from_memory(&bytes)
        .map_err(|e| ReslideError::backend(service, format!("invalid image payload: {e}")))
}
