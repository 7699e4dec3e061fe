// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// HTTP client for a line-level OCR service.
//
//   POST {base}/ocr  {"image": <base64 png>, "language", "char_boxes"}
//                    -> {"lines": [{"text", "bbox": [x0,y0,x1,y1], "confidence"?, "chars"?}]}

use async_trait::async_trait;
use image::DynamicImage;
use reslide_core::BBox;
use reslide_core::config::EndpointSettings;
use reslide_core::error::Result;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::codec::png_base64;
use crate::http::HttpBackend;
use crate::traits::{OcrBackend, OcrChar, OcrLine, OcrOptions};

const SERVICE: &str = "ocr";

#[derive(Serialize)]
struct OcrRequest<'a> {
    image: String,
    language: &'a str,
    char_boxes: bool,
}

#[derive(Deserialize)]
struct OcrResponse {
    #[serde(default)]
    lines: Vec<WireLine>,
}

#[derive(Deserialize)]
struct WireLine {
    text: String,
    bbox: [f64; 4],
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    chars: Vec<WireChar>,
}

#[derive(Deserialize)]
struct WireChar {
    #[serde(rename = "char")]
    text: String,
    bbox: [f64; 4],
}

impl From<WireLine> for OcrLine {
    fn from(line: WireLine) -> Self {
        Self {
            text: line.text,
            bbox: BBox::from_array(line.bbox),
            confidence: line.confidence,
            chars: line
                .chars
                .into_iter()
                .map(|c| OcrChar {
                    text: c.text,
                    bbox: BBox::from_array(c.bbox),
                })
                .collect(),
        }
    }
}

/// OCR backend reached over HTTP.
#[derive(Debug, Clone)]
pub struct HttpOcrBackend {
    http: HttpBackend,
}

impl HttpOcrBackend {
    pub fn new(settings: &EndpointSettings) -> Result<Self> {
        Ok(Self {
            http: HttpBackend::new(SERVICE, settings)?,
        })
    }
}

#[async_trait]
impl OcrBackend for HttpOcrBackend {
    fn name(&self) -> &str {
        SERVICE
    }

    #[instrument(skip(self, image), fields(width = image.width(), height = image.height()))]
    async fn recognize(&self, image: &DynamicImage, options: &OcrOptions) -> Result<Vec<OcrLine>> {
        let request = OcrRequest {
            image: png_base64(image)?,
            language: &options.language,
            char_boxes: options.char_boxes,
        };
        let response: OcrResponse = self.http.post_json("ocr", &request).await?;
        let lines: Vec<OcrLine> = response
            .lines
            .into_iter()
            .filter(|l| !l.text.trim().is_empty())
            .map(OcrLine::from)
            .collect();
        debug!(lines = lines.len(), "OCR complete");
        Ok(lines)
    }
}
