// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// reslide-backend — Narrow interfaces to the external collaborators of the
// reconstruction engine, with HTTP clients, offline implementations, and a
// bounded retry engine.
//
// Consumed services: a batch layout-analysis service, a line-level OCR
// service, generative image-editing, rectangle-based region removal,
// mask-based inpainting, and a vision model for text style.

pub mod codec;
pub mod http;
pub mod layout_client;
pub mod local_fill;
pub mod ocr_client;
pub mod raster_client;
pub mod retry;
pub mod stub;
pub mod style_client;
pub mod traits;

#[cfg(feature = "ocr")]
pub mod local_ocr;

pub use http::HttpBackend;
pub use layout_client::HttpLayoutBackend;
pub use local_fill::LocalFillBackend;
pub use ocr_client::HttpOcrBackend;
pub use raster_client::{HttpImageEditBackend, HttpMaskFillBackend, HttpRegionRemovalBackend};
pub use retry::RetryConfig;
pub use style_client::VisionStyleBackend;
pub use traits::*;

#[cfg(feature = "ocr")]
pub use local_ocr::LocalOcrBackend;
