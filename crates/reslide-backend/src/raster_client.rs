// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// HTTP clients for the raster editing services.
//
//   POST {base}/edits    {"model"?, "image", "instruction", "references": [..]} -> {"image"}
//   POST {base}/remove   {"image", "regions": [[x0,y0,x1,y1], ..]}             -> {"image"}
//   POST {base}/inpaint  {"image", "mask"}                                     -> {"image"}
//
// Every image travels as base64 PNG.

use async_trait::async_trait;
use image::{DynamicImage, GrayImage};
use reslide_core::BBox;
use reslide_core::config::EndpointSettings;
use reslide_core::error::{ReslideError, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::codec::{decode_base64_image, mask_base64, png_base64};
use crate::http::HttpBackend;
use crate::traits::{ImageEditBackend, MaskFillBackend, RegionRemovalBackend};

#[derive(Deserialize)]
struct ImageResponse {
    image: String,
}

fn decode_reply(service: &str, reply: ImageResponse, expected: (u32, u32)) -> Result<DynamicImage> {
    let image = decode_base64_image(service, &reply.image)?;
    if image.width() == 0 || image.height() == 0 {
        return Err(ReslideError::backend(service, "returned an empty image"));
    }
    if (image.width(), image.height()) != expected {
        debug!(
            service,
            got_w = image.width(),
            got_h = image.height(),
            want_w = expected.0,
            want_h = expected.1,
            "backend changed image size"
        );
    }
    Ok(image)
}

// -- Generative editing ---------------------------------------------------------

#[derive(Serialize)]
struct EditRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    image: String,
    instruction: &'a str,
    references: Vec<String>,
}

/// Generative image-editing backend reached over HTTP.
#[derive(Debug, Clone)]
pub struct HttpImageEditBackend {
    http: HttpBackend,
}

impl HttpImageEditBackend {
    pub fn new(settings: &EndpointSettings) -> Result<Self> {
        Ok(Self {
            http: HttpBackend::new("image_edit", settings)?,
        })
    }
}

#[async_trait]
impl ImageEditBackend for HttpImageEditBackend {
    fn name(&self) -> &str {
        self.http.service()
    }

    #[instrument(skip_all, fields(references = references.len()))]
    async fn edit(
        &self,
        image: &DynamicImage,
        instruction: &str,
        references: &[DynamicImage],
    ) -> Result<DynamicImage> {
        let request = EditRequest {
            model: self.http.model(),
            image: png_base64(image)?,
            instruction,
            references: references.iter().map(png_base64).collect::<Result<_>>()?,
        };
        let reply: ImageResponse = self.http.post_json("edits", &request).await?;
        decode_reply(self.http.service(), reply, (image.width(), image.height()))
    }
}

// -- Region removal -------------------------------------------------------------

#[derive(Serialize)]
struct RemoveRequest {
    image: String,
    regions: Vec<[f64; 4]>,
}

/// Rectangle-based object removal reached over HTTP.
#[derive(Debug, Clone)]
pub struct HttpRegionRemovalBackend {
    http: HttpBackend,
    max_side: u32,
}

impl HttpRegionRemovalBackend {
    pub fn new(settings: &EndpointSettings, max_side: u32) -> Result<Self> {
        Ok(Self {
            http: HttpBackend::new("region_removal", settings)?,
            max_side,
        })
    }
}

#[async_trait]
impl RegionRemovalBackend for HttpRegionRemovalBackend {
    fn name(&self) -> &str {
        self.http.service()
    }

    fn max_side(&self) -> Option<u32> {
        Some(self.max_side)
    }

    #[instrument(skip_all, fields(regions = regions.len()))]
    async fn remove_regions(&self, image: &DynamicImage, regions: &[BBox]) -> Result<DynamicImage> {
        let request = RemoveRequest {
            image: png_base64(image)?,
            regions: regions.iter().map(BBox::to_array).collect(),
        };
        let reply: ImageResponse = self.http.post_json("remove", &request).await?;
        decode_reply(self.http.service(), reply, (image.width(), image.height()))
    }
}

// -- Mask inpainting --------------------------------------------------------------

#[derive(Serialize)]
struct InpaintRequest {
    image: String,
    mask: String,
}

/// Mask-based inpainting reached over HTTP.
#[derive(Debug, Clone)]
pub struct HttpMaskFillBackend {
    http: HttpBackend,
}

impl HttpMaskFillBackend {
    pub fn new(settings: &EndpointSettings) -> Result<Self> {
        Ok(Self {
            http: HttpBackend::new("mask_fill", settings)?,
        })
    }
}

#[async_trait]
impl MaskFillBackend for HttpMaskFillBackend {
    fn name(&self) -> &str {
        self.http.service()
    }

    #[instrument(skip_all)]
    async fn fill(&self, image: &DynamicImage, mask: &GrayImage) -> Result<DynamicImage> {
        let request = InpaintRequest {
            image: png_base64(image)?,
            mask: mask_base64(mask)?,
        };
        let reply: ImageResponse = self.http.post_json("inpaint", &request).await?;
        decode_reply(self.http.service(), reply, (image.width(), image.height()))
    }
}
