// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Service wiring: backend handles, provider registries, and the immutable
// configuration object the orchestrator is constructed with.
//
// Providers are built once per kind while the configuration is assembled and
// shared by every registry entry naming that kind. Nothing is cached after
// construction.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use reslide_backend::{
    HttpImageEditBackend, HttpLayoutBackend, HttpMaskFillBackend, HttpOcrBackend,
    HttpRegionRemovalBackend, ImageEditBackend, LayoutBackend, LocalFillBackend, MaskFillBackend,
    OcrBackend, OcrOptions, RegionRemovalBackend, StyleBackend, VisionStyleBackend,
};
use reslide_core::config::BackendSettings;
use reslide_core::error::Result;
use reslide_core::{AppConfig, ElementType, ReconstructionSettings};
use tracing::{debug, info, warn};

use crate::extract::{Extractor, HybridExtractor, LayoutExtractor, MergeThresholds, TextOcrExtractor};
use crate::inpaint::{
    GenerativeInpaintProvider, HybridInpaintProvider, InpaintOptions, InpaintProvider,
    MaskInpaintProvider, RegionFillProvider,
};
use crate::registry::{ExtractorKind, ExtractorRegistry, InpaintRegistry, InpainterKind};
use crate::style::{PixelStyleExtractor, TextAttributeExtractor, VisionStyleExtractor};

/// Handles to every external collaborator; `None` where unavailable.
#[derive(Clone, Default)]
pub struct Backends {
    pub layout: Option<Arc<dyn LayoutBackend>>,
    pub ocr: Option<Arc<dyn OcrBackend>>,
    pub image_edit: Option<Arc<dyn ImageEditBackend>>,
    pub region_removal: Option<Arc<dyn RegionRemovalBackend>>,
    pub mask_fill: Option<Arc<dyn MaskFillBackend>>,
    pub style: Option<Arc<dyn StyleBackend>>,
}

impl std::fmt::Debug for Backends {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backends")
            .field("layout", &self.layout.as_ref().map(|b| b.name().to_string()))
            .field("ocr", &self.ocr.as_ref().map(|b| b.name().to_string()))
            .field("image_edit", &self.image_edit.as_ref().map(|b| b.name().to_string()))
            .field("region_removal", &self.region_removal.as_ref().map(|b| b.name().to_string()))
            .field("mask_fill", &self.mask_fill.as_ref().map(|b| b.name().to_string()))
            .field("style", &self.style.as_ref().map(|b| b.name().to_string()))
            .finish()
    }
}

impl Backends {
    /// HTTP clients for every configured endpoint. Region removal and mask
    /// fill fall back to the local filler when no endpoint is configured.
    pub fn from_settings(backends: &BackendSettings, settings: &ReconstructionSettings) -> Result<Self> {
        let mut out = Self::offline();
        if let Some(endpoint) = &backends.layout {
            out.layout = Some(Arc::new(HttpLayoutBackend::new(endpoint)?));
        }
        if let Some(endpoint) = &backends.ocr {
            out.ocr = Some(Arc::new(HttpOcrBackend::new(endpoint)?));
        }
        if let Some(endpoint) = &backends.image_edit {
            out.image_edit = Some(Arc::new(HttpImageEditBackend::new(endpoint)?));
        }
        if let Some(endpoint) = &backends.region_removal {
            out.region_removal = Some(Arc::new(HttpRegionRemovalBackend::new(
                endpoint,
                settings.region_fill_max_side,
            )?));
        }
        if let Some(endpoint) = &backends.mask_fill {
            out.mask_fill = Some(Arc::new(HttpMaskFillBackend::new(endpoint)?));
        }
        if let Some(endpoint) = &backends.style {
            out.style = Some(Arc::new(VisionStyleBackend::new(endpoint)?));
        }
        debug!(backends = ?out, "backends connected");
        Ok(out)
    }

    /// Only what runs in-process: the local region and mask filler.
    pub fn offline() -> Self {
        let local = Arc::new(LocalFillBackend::new());
        Self {
            region_removal: Some(local.clone()),
            mask_fill: Some(local),
            ..Self::default()
        }
    }
}

/// Everything the orchestrator needs, built once and shared read-only.
#[derive(Clone)]
pub struct ServiceConfig {
    pub settings: ReconstructionSettings,
    pub extractors: ExtractorRegistry,
    pub inpainters: InpaintRegistry,
    /// Style inference; `None` disables it.
    pub styles: Option<Arc<dyn TextAttributeExtractor>>,
}

impl std::fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("settings", &self.settings)
            .field("extractors", &self.extractors)
            .field("inpainters", &self.inpainters)
            .field("styles", &self.styles.as_ref().map(|s| s.name().to_string()))
            .finish()
    }
}

impl ServiceConfig {
    /// Empty registries, no style inference.
    pub fn new(settings: ReconstructionSettings) -> Self {
        Self {
            settings,
            extractors: ExtractorRegistry::new(),
            inpainters: InpaintRegistry::new(),
            styles: None,
        }
    }

    pub fn with_extractors(mut self, extractors: ExtractorRegistry) -> Self {
        self.extractors = extractors;
        self
    }

    pub fn with_inpainters(mut self, inpainters: InpaintRegistry) -> Self {
        self.inpainters = inpainters;
        self
    }

    pub fn with_styles(mut self, styles: Arc<dyn TextAttributeExtractor>) -> Self {
        self.styles = Some(styles);
        self
    }

    pub fn inpaint_options(&self) -> InpaintOptions {
        InpaintOptions {
            expand_px: self.settings.inpaint_expand_px,
        }
    }

    /// Wire registries from the provider selection in `config`.
    ///
    /// Unknown kind or type names are configuration errors. A kind whose
    /// backend is missing is skipped with a warning; a hybrid extractor with
    /// one half missing degrades to the other half.
    pub fn from_app_config(config: &AppConfig, backends: &Backends) -> Result<Self> {
        config.validate()?;
        let settings = config.reconstruction.clone();
        let selection = &config.providers;
        let mut builder = ProviderBuilder::new(&settings, backends);

        let mut extractors = ExtractorRegistry::new();
        let default_kind = ExtractorKind::from_str(&selection.default_extractor)?;
        match builder.extractor(default_kind) {
            Some(extractor) => {
                extractors.set_default(extractor);
            }
            None => warn!(kind = ?default_kind, "no backend for the default extractor"),
        }
        for (type_name, kind_name) in &selection.extractors {
            let element_type = ElementType::from_str(type_name)?;
            let kind = ExtractorKind::from_str(kind_name)?;
            match builder.extractor(kind) {
                Some(extractor) => {
                    extractors.register(element_type, extractor);
                }
                None => warn!(%element_type, ?kind, "no backend for extractor, type uses the default"),
            }
        }

        let mut inpainters = InpaintRegistry::new();
        if let Some(name) = &selection.default_inpainter {
            let kind = InpainterKind::from_str(name)?;
            match builder.inpainter(kind) {
                Some(provider) => {
                    inpainters.set_default(provider);
                }
                None => warn!(?kind, "no backend for the default inpainter"),
            }
        }
        for (type_name, kind_name) in &selection.inpainters {
            let element_type = ElementType::from_str(type_name)?;
            let kind = InpainterKind::from_str(kind_name)?;
            match builder.inpainter(kind) {
                Some(provider) => {
                    inpainters.register(element_type, provider);
                }
                None => warn!(%element_type, ?kind, "no backend for inpainter, type uses the default"),
            }
        }

        let styles: Option<Arc<dyn TextAttributeExtractor>> = if !settings.extract_styles {
            None
        } else if let Some(backend) = &backends.style {
            Some(Arc::new(VisionStyleExtractor::new(Arc::clone(backend))))
        } else {
            Some(Arc::new(PixelStyleExtractor::new()))
        };

        info!(
            extractor_types = extractors.registered_types().count(),
            inpainter_types = inpainters.registered_types().count(),
            styles = ?styles.as_ref().map(|s| s.name()),
            "service configured"
        );
        Ok(Self {
            settings,
            extractors,
            inpainters,
            styles,
        })
    }
}

/// Builds each provider kind at most once.
struct ProviderBuilder<'a> {
    settings: &'a ReconstructionSettings,
    backends: &'a Backends,
    extractors: HashMap<ExtractorKind, Option<Arc<dyn Extractor>>>,
    inpainters: HashMap<InpainterKind, Option<Arc<dyn InpaintProvider>>>,
}

impl<'a> ProviderBuilder<'a> {
    fn new(settings: &'a ReconstructionSettings, backends: &'a Backends) -> Self {
        Self {
            settings,
            backends,
            extractors: HashMap::new(),
            inpainters: HashMap::new(),
        }
    }

    fn extractor(&mut self, kind: ExtractorKind) -> Option<Arc<dyn Extractor>> {
        if let Some(built) = self.extractors.get(&kind) {
            return built.clone();
        }
        let built = self.build_extractor(kind);
        self.extractors.insert(kind, built.clone());
        built
    }

    fn build_extractor(&mut self, kind: ExtractorKind) -> Option<Arc<dyn Extractor>> {
        let s = self.settings;
        match kind {
            ExtractorKind::Layout => self.backends.layout.as_ref().map(|backend| {
                Arc::new(LayoutExtractor::new(Arc::clone(backend)).with_polling(
                    Duration::from_millis(s.layout_poll_interval_ms),
                    s.layout_max_polls,
                )) as Arc<dyn Extractor>
            }),
            ExtractorKind::Ocr => self.backends.ocr.as_ref().map(|backend| {
                Arc::new(TextOcrExtractor::new(Arc::clone(backend)).with_options(OcrOptions {
                    language: s.ocr_language.clone(),
                    char_boxes: s.ocr_char_boxes,
                })) as Arc<dyn Extractor>
            }),
            ExtractorKind::Hybrid => {
                let layout = self.extractor(ExtractorKind::Layout);
                let ocr = self.extractor(ExtractorKind::Ocr);
                match (layout, ocr) {
                    (Some(layout), Some(ocr)) => Some(Arc::new(HybridExtractor::new(
                        layout,
                        ocr,
                        MergeThresholds::from(s),
                    )) as Arc<dyn Extractor>),
                    (Some(only), None) | (None, Some(only)) => {
                        warn!(using = only.name(), "hybrid extractor is missing a backend");
                        Some(only)
                    }
                    (None, None) => None,
                }
            }
        }
    }

    fn inpainter(&mut self, kind: InpainterKind) -> Option<Arc<dyn InpaintProvider>> {
        if let Some(built) = self.inpainters.get(&kind) {
            return built.clone();
        }
        let built = self.build_inpainter(kind);
        self.inpainters.insert(kind, built.clone());
        built
    }

    fn build_inpainter(&self, kind: InpainterKind) -> Option<Arc<dyn InpaintProvider>> {
        let b = self.backends;
        let region = || {
            b.region_removal
                .as_ref()
                .map(|r| RegionFillProvider::new(Arc::clone(r), self.settings.region_fill_max_side))
        };
        match kind {
            InpainterKind::Mask => b
                .mask_fill
                .as_ref()
                .map(|m| Arc::new(MaskInpaintProvider::new(Arc::clone(m))) as Arc<dyn InpaintProvider>),
            InpainterKind::Generative => b.image_edit.as_ref().map(|e| {
                Arc::new(GenerativeInpaintProvider::new(Arc::clone(e))) as Arc<dyn InpaintProvider>
            }),
            InpainterKind::Region => region().map(|r| Arc::new(r) as Arc<dyn InpaintProvider>),
            InpainterKind::Hybrid => region().map(|r| {
                let hybrid = match &b.image_edit {
                    Some(edit) => HybridInpaintProvider::new(r)
                        .with_enhancer(Arc::clone(edit), self.settings.hybrid_enhance),
                    None => HybridInpaintProvider::new(r),
                };
                Arc::new(hybrid) as Arc<dyn InpaintProvider>
            }),
        }
    }
}
