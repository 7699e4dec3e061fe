// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Text style attributes attached to text elements.
//
// Style extractors write a `TextStyle` into element metadata under
// `STYLE_METADATA_KEY`; the document builder reads it back. Elements without a
// stored style render with `TextStyle::default()`.

use serde::{Deserialize, Serialize};

use crate::types::Metadata;

/// Metadata key holding a serialized [`TextStyle`].
pub const STYLE_METADATA_KEY: &str = "style";

/// Horizontal alignment of text inside its box.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Alignment {
    #[default]
    Left,
    Center,
    Right,
    Justify,
}

impl Alignment {
    /// Lenient parse of model output (`"centre"`, `"ctr"`, `"justified"` ...).
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "left" | "l" | "start" => Some(Self::Left),
            "center" | "centre" | "ctr" | "middle" => Some(Self::Center),
            "right" | "r" | "end" => Some(Self::Right),
            "justify" | "justified" | "just" => Some(Self::Justify),
            _ => None,
        }
    }
}

/// One differently styled segment of a text element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextRun {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color_hex: Option<String>,
    #[serde(default)]
    pub bold: bool,
    #[serde(default)]
    pub italic: bool,
}

/// Style of a whole text element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextStyle {
    /// `#RRGGBB`.
    pub color_hex: String,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub alignment: Alignment,
    /// Non-empty only for mixed-style text; runs concatenate to the content.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub runs: Vec<TextRun>,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            color_hex: "#000000".into(),
            bold: false,
            italic: false,
            underline: false,
            alignment: Alignment::Left,
            runs: Vec::new(),
        }
    }
}

impl TextStyle {
    /// Read the style stored in `metadata`, if any and well-formed.
    pub fn from_metadata(metadata: &Metadata) -> Option<Self> {
        metadata
            .get(STYLE_METADATA_KEY)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Store this style in `metadata`.
    pub fn store(&self, metadata: &mut Metadata) {
        if let Ok(value) = serde_json::to_value(self) {
            metadata.insert(STYLE_METADATA_KEY.to_string(), value);
        }
    }

    pub fn is_mixed(&self) -> bool {
        self.runs.len() > 1
    }
}

/// Normalise a colour string to `#RRGGBB`, accepting `RRGGBB`, `#RGB` and
/// `#RRGGBBAA` (alpha dropped). Returns `None` for anything else.
pub fn normalize_hex(color: &str) -> Option<String> {
    let hex = color.trim().trim_start_matches('#');
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let full = match hex.len() {
        3 => hex.chars().flat_map(|c| [c, c]).collect::<String>(),
        6 => hex.to_string(),
        8 => hex[..6].to_string(),
        _ => return None,
    };
    Some(format!("#{}", full.to_ascii_uppercase()))
}

/// Format an RGB triple as `#RRGGBB`.
pub fn rgb_hex(rgb: [u8; 3]) -> String {
    format!("#{:02X}{:02X}{:02X}", rgb[0], rgb[1], rgb[2])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_black_regular_left() {
        let style = TextStyle::default();
        assert_eq!(style.color_hex, "#000000");
        assert!(!style.bold && !style.italic && !style.underline);
        assert_eq!(style.alignment, Alignment::Left);
    }

    #[test]
    fn stored_style_reads_back() {
        let mut metadata = Metadata::new();
        let style = TextStyle {
            color_hex: "#FF8800".into(),
            bold: true,
            alignment: Alignment::Center,
            ..TextStyle::default()
        };
        style.store(&mut metadata);
        assert_eq!(TextStyle::from_metadata(&metadata), Some(style));
    }

    #[test]
    fn hex_normalisation() {
        assert_eq!(normalize_hex("ff0000").as_deref(), Some("#FF0000"));
        assert_eq!(normalize_hex("#abc").as_deref(), Some("#AABBCC"));
        assert_eq!(normalize_hex("#11223344").as_deref(), Some("#112233"));
        assert_eq!(normalize_hex("red"), None);
        assert_eq!(rgb_hex([255, 0, 16]), "#FF0010");
    }

    #[test]
    fn alignment_labels() {
        assert_eq!(Alignment::from_label("Centre"), Some(Alignment::Center));
        assert_eq!(Alignment::from_label("justified"), Some(Alignment::Justify));
        assert_eq!(Alignment::from_label("diagonal"), None);
    }
}
