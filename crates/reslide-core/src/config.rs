// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Application configuration.
//
// Every section has serde defaults so a partial TOML file (or none at all)
// yields a working configuration. The loaded config is validated once and then
// shared read-only.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{ReslideError, Result};
use crate::types::ElementType;

/// Thresholds and limits for extraction, merge, and recursion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconstructionSettings {
    /// Maximum recursion depth. `1` disables recursion.
    pub max_depth: u32,
    /// Minimum width and height (px) of a region worth decomposing.
    pub min_image_size: u32,
    /// Minimum area (px²) of a region worth decomposing.
    pub min_image_area: u64,
    /// Regions covering more than this fraction of their parent are not decomposed.
    pub max_child_coverage_ratio: f64,
    /// OCR-line containment ratio above which it belongs to a layout region.
    pub contain_threshold: f64,
    /// Overlap ratio above which a layout text region yields to an OCR line.
    pub intersection_threshold: f64,
    /// Concurrent recursive branches per image.
    pub max_concurrent_children: usize,
    /// Concurrent top-level images in a batch.
    pub batch_concurrency: usize,
    /// Pixels added around every region in an inpainting mask.
    pub inpaint_expand_px: u32,
    /// Longest side the region-removal backend accepts.
    pub region_fill_max_side: u32,
    /// Whether the hybrid inpainter runs its generative enhancement pass.
    pub hybrid_enhance: bool,
    /// Whether text style attributes are requested.
    pub extract_styles: bool,
    /// Layout backend poll interval in milliseconds.
    pub layout_poll_interval_ms: u64,
    /// Maximum number of layout polls before giving up.
    pub layout_max_polls: u32,
    /// OCR language hint.
    pub ocr_language: String,
    /// Request character-level boxes from OCR.
    pub ocr_char_boxes: bool,
    /// Root directory for per-call output (crops, backgrounds, assets).
    pub output_dir: PathBuf,
}

impl Default for ReconstructionSettings {
    fn default() -> Self {
        Self {
            max_depth: 1,
            min_image_size: 200,
            min_image_area: 40_000,
            max_child_coverage_ratio: 0.85,
            contain_threshold: 0.8,
            intersection_threshold: 0.3,
            max_concurrent_children: 8,
            batch_concurrency: 4,
            inpaint_expand_px: 4,
            region_fill_max_side: 2048,
            hybrid_enhance: false,
            extract_styles: true,
            layout_poll_interval_ms: 2_000,
            layout_max_polls: 150,
            ocr_language: "auto".into(),
            ocr_char_boxes: false,
            output_dir: std::env::temp_dir().join("reslide"),
        }
    }
}

impl ReconstructionSettings {
    pub fn validate(&self) -> Result<()> {
        if self.max_depth == 0 {
            return Err(ReslideError::Config("max_depth must be at least 1".into()));
        }
        for (name, value) in [
            ("max_child_coverage_ratio", self.max_child_coverage_ratio),
            ("contain_threshold", self.contain_threshold),
            ("intersection_threshold", self.intersection_threshold),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(ReslideError::Config(format!(
                    "{name} must be in (0, 1], got {value}"
                )));
            }
        }
        if self.max_concurrent_children == 0 || self.batch_concurrency == 0 {
            return Err(ReslideError::Config("concurrency limits must be at least 1".into()));
        }
        if self.region_fill_max_side < 64 {
            return Err(ReslideError::Config(format!(
                "region_fill_max_side must be at least 64, got {}",
                self.region_fill_max_side
            )));
        }
        Ok(())
    }
}

/// Output document settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentSettings {
    /// Slide size in pixels; defaults to the first image's size.
    pub target_slide_px: Option<(u32, u32)>,
    /// Font used for glyph-width measurement.
    pub font_path: Option<PathBuf>,
    /// Font family written into text runs.
    pub font_family: String,
    pub min_font_pt: f32,
    pub max_font_pt: f32,
    /// Fraction added to text box width/height.
    pub bbox_expand_ratio: f64,
    /// Line height as a multiple of the font size.
    pub line_spacing: f32,
}

impl Default for DocumentSettings {
    fn default() -> Self {
        Self {
            target_slide_px: None,
            font_path: None,
            font_family: "Arial".into(),
            min_font_pt: 6.0,
            max_font_pt: 200.0,
            bbox_expand_ratio: 0.01,
            line_spacing: 1.2,
        }
    }
}

impl DocumentSettings {
    pub fn validate(&self) -> Result<()> {
        if !(self.min_font_pt > 0.0 && self.min_font_pt <= self.max_font_pt) {
            return Err(ReslideError::Config(format!(
                "font bounds must satisfy 0 < min <= max, got {}..{}",
                self.min_font_pt, self.max_font_pt
            )));
        }
        if self.line_spacing <= 0.0 {
            return Err(ReslideError::Config("line_spacing must be positive".into()));
        }
        if let Some((w, h)) = self.target_slide_px {
            if w == 0 || h == 0 {
                return Err(ReslideError::Config("target_slide_px must be non-zero".into()));
            }
        }
        Ok(())
    }
}

/// Which extractor and inpainter serve which element type.
///
/// Keys are element type names (`chart`, `table_cell`, ...); values are
/// provider kind names parsed by the engine (`layout`, `ocr`, `hybrid` for
/// extractors; `mask`, `generative`, `region`, `hybrid` for inpainters).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSelection {
    pub default_extractor: String,
    pub extractors: BTreeMap<String, String>,
    pub default_inpainter: Option<String>,
    pub inpainters: BTreeMap<String, String>,
}

impl Default for ProviderSelection {
    fn default() -> Self {
        let mut inpainters = BTreeMap::new();
        for t in [ElementType::Table, ElementType::Text, ElementType::Paragraph] {
            inpainters.insert(t.as_str().to_string(), "region".to_string());
        }
        for t in [ElementType::Image, ElementType::Figure, ElementType::Chart] {
            inpainters.insert(t.as_str().to_string(), "generative".to_string());
        }
        Self {
            default_extractor: "hybrid".into(),
            extractors: BTreeMap::new(),
            default_inpainter: Some("region".into()),
            inpainters,
        }
    }
}

/// Connection settings for one external backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointSettings {
    pub base_url: String,
    /// Environment variable holding the API key, if the backend needs one.
    pub api_key_env: Option<String>,
    pub model: Option<String>,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl Default for EndpointSettings {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_key_env: None,
            model: None,
            timeout_secs: 120,
            max_retries: 3,
        }
    }
}

impl EndpointSettings {
    /// Read the API key from the configured environment variable.
    pub fn api_key(&self) -> Result<Option<String>> {
        match &self.api_key_env {
            None => Ok(None),
            Some(var) => std::env::var(var).map(Some).map_err(|_| {
                ReslideError::Config(format!("environment variable {var} is not set"))
            }),
        }
    }
}

/// Optional endpoints for every external collaborator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendSettings {
    pub layout: Option<EndpointSettings>,
    pub ocr: Option<EndpointSettings>,
    pub image_edit: Option<EndpointSettings>,
    pub region_removal: Option<EndpointSettings>,
    pub mask_fill: Option<EndpointSettings>,
    pub style: Option<EndpointSettings>,
}

/// Complete configuration, as loaded from a TOML file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub reconstruction: ReconstructionSettings,
    pub document: DocumentSettings,
    pub providers: ProviderSelection,
    pub backends: BackendSettings,
}

impl AppConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)
            .map_err(|err| ReslideError::Config(format!("failed to parse config: {err}")))?;
        config.validate()?;
        debug!(reconstruction = ?config.reconstruction, "configuration parsed");
        Ok(config)
    }

    /// Load and validate a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&text)?;
        info!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.reconstruction.validate()?;
        self.document.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_thresholds() {
        let s = ReconstructionSettings::default();
        assert_eq!(s.max_depth, 1);
        assert_eq!(s.min_image_size, 200);
        assert_eq!(s.min_image_area, 40_000);
        assert_eq!(s.max_child_coverage_ratio, 0.85);
        assert_eq!(s.contain_threshold, 0.8);
        assert_eq!(s.intersection_threshold, 0.3);
        assert!(AppConfig::default().validate().is_ok());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = AppConfig::from_toml_str(
            r#"
            [reconstruction]
            max_depth = 3
            contain_threshold = 0.9

            [providers]
            default_extractor = "layout"

            [providers.extractors]
            chart = "ocr"

            [backends.ocr]
            base_url = "http://localhost:9000"
            "#,
        )
        .unwrap();
        assert_eq!(config.reconstruction.max_depth, 3);
        assert_eq!(config.reconstruction.contain_threshold, 0.9);
        assert_eq!(config.reconstruction.min_image_size, 200);
        assert_eq!(config.providers.default_extractor, "layout");
        assert_eq!(
            config.providers.extractors.get("chart").map(String::as_str),
            Some("ocr")
        );
        let ocr = config.backends.ocr.unwrap();
        assert_eq!(ocr.base_url, "http://localhost:9000");
        assert_eq!(ocr.timeout_secs, 120);
        assert!(config.backends.layout.is_none());
    }

    #[test]
    fn invalid_thresholds_are_rejected() {
        let err = AppConfig::from_toml_str("[reconstruction]\nintersection_threshold = 1.5\n");
        assert!(matches!(err, Err(ReslideError::Config(_))));
        let err = AppConfig::from_toml_str("[reconstruction]\nmax_depth = 0\n");
        assert!(matches!(err, Err(ReslideError::Config(_))));
        let err = AppConfig::from_toml_str("[document]\nmin_font_pt = 30.0\nmax_font_pt = 10.0\n");
        assert!(matches!(err, Err(ReslideError::Config(_))));
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reslide.toml");
        std::fs::write(&path, "[document]\nmax_font_pt = 96.0\n").unwrap();
        let config = AppConfig::from_toml_file(&path).unwrap();
        assert_eq!(config.document.max_font_pt, 96.0);
    }
}
