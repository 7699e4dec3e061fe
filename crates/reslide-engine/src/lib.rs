// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// reslide-engine — Extraction, hybrid merge, inpainting, style inference,
// provider registries, and the recursive reconstruction service.

pub mod config;
pub mod extract;
pub mod inpaint;
pub mod registry;
pub mod service;
pub mod style;

pub use config::{Backends, ServiceConfig};
pub use extract::{Extraction, ExtractionContext, Extractor, RawElement};
pub use inpaint::{InpaintOptions, InpaintProvider};
pub use registry::{ExtractorKind, ExtractorRegistry, InpaintRegistry, InpainterKind, ProviderRegistry};
pub use service::{Reconstruction, ReconstructionService, should_recurse};
pub use style::{StyleTarget, TextAttributeExtractor};
