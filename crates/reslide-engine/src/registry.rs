// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Type-keyed provider registries.
//
// A registry maps element types to a shared provider handle. A lookup for an
// unregistered type (or for the root image, which has no type) falls through
// to the default.

use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;

use reslide_core::ElementType;
use reslide_core::error::{ReslideError, Result};

use crate::extract::Extractor;
use crate::inpaint::InpaintProvider;

/// Element type → provider, with a default.
pub struct ProviderRegistry<P: ?Sized> {
    by_type: BTreeMap<ElementType, Arc<P>>,
    default: Option<Arc<P>>,
}

pub type ExtractorRegistry = ProviderRegistry<dyn Extractor>;
pub type InpaintRegistry = ProviderRegistry<dyn InpaintProvider>;

impl<P: ?Sized> Default for ProviderRegistry<P> {
    fn default() -> Self {
        Self {
            by_type: BTreeMap::new(),
            default: None,
        }
    }
}

impl<P: ?Sized> Clone for ProviderRegistry<P> {
    fn clone(&self) -> Self {
        Self {
            by_type: self.by_type.clone(),
            default: self.default.clone(),
        }
    }
}

impl<P: ?Sized> std::fmt::Debug for ProviderRegistry<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("types", &self.by_type.keys().collect::<Vec<_>>())
            .field("has_default", &self.default.is_some())
            .finish()
    }
}

impl<P: ?Sized> ProviderRegistry<P> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `element_type` with `provider`, replacing any earlier registration.
    pub fn register(&mut self, element_type: ElementType, provider: Arc<P>) -> &mut Self {
        self.by_type.insert(element_type, provider);
        self
    }

    pub fn set_default(&mut self, provider: Arc<P>) -> &mut Self {
        self.default = Some(provider);
        self
    }

    /// Provider for `element_type`, else the default.
    pub fn select(&self, element_type: Option<ElementType>) -> Option<Arc<P>> {
        match element_type.and_then(|t| self.by_type.get(&t)) {
            Some(provider) => Some(Arc::clone(provider)),
            None => self.default.clone(),
        }
    }

    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }

    pub fn registered_types(&self) -> impl Iterator<Item = ElementType> + '_ {
        self.by_type.keys().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.by_type.is_empty() && self.default.is_none()
    }
}

/// Extractor kinds nameable in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtractorKind {
    Layout,
    Ocr,
    Hybrid,
}

impl FromStr for ExtractorKind {
    type Err = ReslideError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "layout" => Ok(Self::Layout),
            "ocr" | "text_ocr" => Ok(Self::Ocr),
            "hybrid" => Ok(Self::Hybrid),
            other => Err(ReslideError::Config(format!("unknown extractor kind '{other}'"))),
        }
    }
}

/// Inpaint provider kinds nameable in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InpainterKind {
    Mask,
    Generative,
    Region,
    Hybrid,
}

impl FromStr for InpainterKind {
    type Err = ReslideError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mask" => Ok(Self::Mask),
            "generative" | "edit" => Ok(Self::Generative),
            "region" | "region_fill" => Ok(Self::Region),
            "hybrid" => Ok(Self::Hybrid),
            other => Err(ReslideError::Config(format!("unknown inpainter kind '{other}'"))),
        }
    }
}
