// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Generative-edit inpainting: the whole image goes to an image-editing model
// with a fixed removal instruction. Region boxes are ignored, which makes this
// the provider of choice when detection is unreliable (photos, charts).

use std::sync::Arc;

use async_trait::async_trait;
use image::{DynamicImage, GenericImageView};
use reslide_backend::ImageEditBackend;
use reslide_core::error::Result;
use reslide_core::{BBox, ElementType};
use tracing::{debug, instrument};

use super::{InpaintOptions, InpaintProvider};

pub const REMOVE_INSTRUCTION: &str = "Remove all text and icons from this image. Keep everything else pixel-identical: \
     the background, colours, shapes, photos and layout must not change. Fill removed areas so they blend \
     seamlessly with their surroundings.";

/// Provider driving an [`ImageEditBackend`].
#[derive(Clone)]
pub struct GenerativeInpaintProvider {
    backend: Arc<dyn ImageEditBackend>,
    instruction: String,
}

impl std::fmt::Debug for GenerativeInpaintProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerativeInpaintProvider")
            .field("backend", &self.backend.name())
            .finish()
    }
}

impl GenerativeInpaintProvider {
    pub fn new(backend: Arc<dyn ImageEditBackend>) -> Self {
        Self {
            backend,
            instruction: REMOVE_INSTRUCTION.to_string(),
        }
    }

    pub fn with_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.instruction = instruction.into();
        self
    }
}

#[async_trait]
impl InpaintProvider for GenerativeInpaintProvider {
    fn name(&self) -> &str {
        "generative"
    }

    #[instrument(skip_all, fields(backend = self.backend.name()))]
    async fn try_inpaint(
        &self,
        image: &DynamicImage,
        _regions: &[BBox],
        _types: &[ElementType],
        _options: &InpaintOptions,
    ) -> Result<DynamicImage> {
        let edited = self.backend.edit(image, &self.instruction, &[]).await?;
        let (w, h) = image.dimensions();
        if edited.dimensions() == (w, h) {
            return Ok(edited);
        }
        debug!(
            got_w = edited.width(),
            got_h = edited.height(),
            "edited image resized back to source size"
        );
        Ok(edited.resize_exact(w, h, image::imageops::FilterType::Lanczos3))
    }
}
