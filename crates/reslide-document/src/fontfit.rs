// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Font-size fitting for text boxes.
//
// The largest size whose wrapped text fits the box height wins. Candidate
// sizes are tried from the maximum down in whole points; wrapping is simulated
// greedily word by word (character by character for CJK text), measuring
// advances with a real font when one is available and with a weighted
// per-character estimate otherwise.

use std::path::{Path, PathBuf};

use ab_glyph::{Font, FontVec};
use reslide_core::DocumentSettings;
use reslide_core::error::{ReslideError, Result};
use tracing::{debug, info};

/// Fonts tried, in order, when no font path is configured.
const SYSTEM_FONT_PATHS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/System/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// How glyph advances are obtained.
pub enum TextMeasurer {
    /// True advances from a loaded font.
    Glyph { font: Box<FontVec>, source: PathBuf },
    /// Weighted per-character estimate.
    Estimate,
}

impl std::fmt::Debug for TextMeasurer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Glyph { source, .. } => f.debug_struct("Glyph").field("source", source).finish(),
            Self::Estimate => f.write_str("Estimate"),
        }
    }
}

impl TextMeasurer {
    /// Load a font file for measurement.
    pub fn from_font_file(path: &Path) -> Result<Self> {
        let data = std::fs::read(path)?;
        let font = FontVec::try_from_vec(data).map_err(|err| {
            ReslideError::Config(format!("{} is not a usable font: {err}", path.display()))
        })?;
        Ok(Self::Glyph {
            font: Box::new(font),
            source: path.to_path_buf(),
        })
    }

    /// The configured font, else the first readable well-known system font,
    /// else the estimate.
    pub fn discover(configured: Option<&Path>) -> Self {
        if let Some(path) = configured {
            match Self::from_font_file(path) {
                Ok(m) => {
                    info!(font = %path.display(), "using configured font for text fitting");
                    return m;
                }
                Err(err) => debug!(error = %err, "configured font unusable"),
            }
        }
        for candidate in SYSTEM_FONT_PATHS {
            if let Ok(m) = Self::from_font_file(Path::new(candidate)) {
                info!(font = *candidate, "using system font for text fitting");
                return m;
            }
        }
        info!("no font found, text fitting uses width estimates");
        Self::Estimate
    }

    pub fn is_exact(&self) -> bool {
        matches!(self, Self::Glyph { .. })
    }

    /// Advance width of `text` at `size_pt`, in points.
    pub fn width_pt(&self, text: &str, size_pt: f32) -> f32 {
        match self {
            Self::Glyph { font, .. } => {
                // Design units to points; `pt_to_px_scale` is 96 dpi pixels.
                let Some(units_per_em) = font.units_per_em() else {
                    return estimate_width(text, size_pt);
                };
                let per_unit = size_pt / units_per_em;
                let mut units = 0.0;
                let mut previous = None;
                for c in text.chars() {
                    let id = font.glyph_id(c);
                    if let Some(prev) = previous {
                        units += font.kern_unscaled(prev, id);
                    }
                    units += font.h_advance_unscaled(id);
                    previous = Some(id);
                }
                units * per_unit
            }
            Self::Estimate => estimate_width(text, size_pt),
        }
    }
}

/// Whether `c` occupies a full em (CJK ideographs, kana, hangul, full-width forms).
pub fn is_wide(c: char) -> bool {
    matches!(c as u32,
        0x1100..=0x115F
        | 0x2E80..=0x303E
        | 0x3041..=0x33FF
        | 0x3400..=0x4DBF
        | 0x4E00..=0x9FFF
        | 0xA000..=0xA4CF
        | 0xAC00..=0xD7A3
        | 0xF900..=0xFAFF
        | 0xFE30..=0xFE4F
        | 0xFF00..=0xFF60
        | 0xFFE0..=0xFFE6
        | 0x20000..=0x2FFFD)
}

/// Width of one character in ems.
fn char_em(c: char) -> f32 {
    if is_wide(c) {
        return 1.0;
    }
    match c {
        ' ' => 0.28,
        'i' | 'j' | 'l' | '!' | '|' | '.' | ',' | ':' | ';' | '\'' | '`' => 0.28,
        'f' | 't' | 'r' | '(' | ')' | '[' | ']' | '-' => 0.36,
        'm' | 'w' => 0.83,
        'M' | 'W' => 0.92,
        c if c.is_ascii_uppercase() => 0.68,
        c if c.is_ascii_digit() => 0.56,
        _ => 0.55,
    }
}

fn estimate_width(text: &str, size_pt: f32) -> f32 {
    text.chars().map(char_em).sum::<f32>() * size_pt
}

/// Split a paragraph into wrap units: words keep their trailing space, wide
/// characters stand alone.
fn wrap_units(paragraph: &str) -> Vec<String> {
    let mut units = Vec::new();
    let mut current = String::new();
    for c in paragraph.chars() {
        if is_wide(c) {
            if !current.is_empty() {
                units.push(std::mem::take(&mut current));
            }
            units.push(c.to_string());
        } else if c == ' ' {
            current.push(c);
            units.push(std::mem::take(&mut current));
        } else {
            current.push(c);
        }
    }
    if !current.is_empty() {
        units.push(current);
    }
    units
}

/// Lines needed to set `text` at `size_pt` in a box `box_width_pt` wide.
pub fn count_lines(measurer: &TextMeasurer, text: &str, size_pt: f32, box_width_pt: f32) -> usize {
    if box_width_pt <= 0.0 {
        return usize::MAX;
    }
    let mut total = 0;
    for paragraph in text.split('\n') {
        let mut lines = 1;
        let mut used = 0.0f32;
        for unit in wrap_units(paragraph) {
            let trimmed = unit.trim_end();
            let advance = measurer.width_pt(&unit, size_pt);
            let visible = measurer.width_pt(trimmed, size_pt);
            if used > 0.0 && used + visible > box_width_pt {
                lines += 1;
                used = 0.0;
            }
            if used == 0.0 && visible > box_width_pt {
                // A unit wider than the box breaks across lines on its own.
                let pieces = (visible / box_width_pt).ceil() as usize;
                lines += pieces - 1;
                used = visible - (pieces - 1) as f32 * box_width_pt + (advance - visible);
                continue;
            }
            used += advance;
        }
        total += lines;
    }
    total
}

/// Search bounds and line height for fitting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitParams {
    pub min_pt: f32,
    pub max_pt: f32,
    pub line_spacing: f32,
}

impl Default for FitParams {
    fn default() -> Self {
        Self {
            min_pt: 6.0,
            max_pt: 200.0,
            line_spacing: 1.2,
        }
    }
}

impl From<&DocumentSettings> for FitParams {
    fn from(settings: &DocumentSettings) -> Self {
        Self {
            min_pt: settings.min_font_pt,
            max_pt: settings.max_font_pt,
            line_spacing: settings.line_spacing,
        }
    }
}

/// Largest font size (points) at which `text` fits a `width_pt` x
/// `height_pt` box. Always within `[params.min_pt, params.max_pt]`; the
/// minimum is returned when nothing fits.
pub fn fit_font_size(
    measurer: &TextMeasurer,
    text: &str,
    width_pt: f32,
    height_pt: f32,
    params: &FitParams,
) -> f32 {
    let min = params.min_pt;
    let max = params.max_pt.max(min);
    if text.trim().is_empty() {
        return max.min(height_pt / params.line_spacing).clamp(min, max);
    }
    let mut size = max.floor();
    while size >= min {
        let lines = count_lines(measurer, text, size, width_pt);
        if lines != usize::MAX && lines as f32 * size * params.line_spacing <= height_pt {
            return size.max(min);
        }
        size -= 1.0;
    }
    min
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wide_glyphs_estimate_wider() {
        let m = TextMeasurer::Estimate;
        assert!(m.width_pt("漢字", 10.0) > m.width_pt("ab", 10.0));
        assert_eq!(m.width_pt("漢", 10.0), 10.0);
    }

    #[test]
    fn short_text_in_tall_box_is_one_line() {
        let m = TextMeasurer::Estimate;
        assert_eq!(count_lines(&m, "Hello world", 12.0, 500.0), 1);
        assert_eq!(count_lines(&m, "Hello\nworld", 12.0, 500.0), 2);
    }

    #[test]
    fn long_text_wraps() {
        let m = TextMeasurer::Estimate;
        let text = "the quick brown fox jumps over the lazy dog ".repeat(4);
        assert!(count_lines(&m, &text, 12.0, 100.0) > 4);
    }

    #[test]
    fn cjk_wraps_per_character() {
        let m = TextMeasurer::Estimate;
        // 10 ideographs at 10pt in a 35pt box: 3 per line, 4 lines.
        assert_eq!(count_lines(&m, "一二三四五六七八九十", 10.0, 35.0), 4);
    }

    #[test]
    fn single_line_fits_box_height() {
        let m = TextMeasurer::Estimate;
        let size = fit_font_size(&m, "Title", 800.0, 61.0, &FitParams::default());
        assert_eq!(size, 50.0);
    }

    #[test]
    fn size_is_non_increasing_with_length_and_bounded() {
        let m = TextMeasurer::Estimate;
        let params = FitParams::default();
        let mut previous = f32::MAX;
        let mut text = String::new();
        for word in "revenue grew strongly across every region this quarter while costs held flat"
            .split(' ')
            .cycle()
            .take(120)
        {
            text.push_str(word);
            text.push(' ');
            let size = fit_font_size(&m, text.trim_end(), 300.0, 120.0, &params);
            assert!((6.0..=200.0).contains(&size));
            assert!(size <= previous, "size grew from {previous} to {size}");
            previous = size;
        }
        assert!(previous < 30.0);
    }

    #[test]
    fn nothing_fits_returns_minimum() {
        let m = TextMeasurer::Estimate;
        assert_eq!(fit_font_size(&m, "word", 1.0, 1.0, &FitParams::default()), 6.0);
    }

    fn fixture_font() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/DejaVuSansMono.ttf")
    }

    // DejaVu Sans Mono: every advance is 1233 units of a 2048 em, no kerning.
    const MONO_EM: f32 = 1233.0 / 2048.0;

    #[test]
    fn missing_font_file_is_an_error() {
        assert!(TextMeasurer::from_font_file(Path::new("/no/such/font.ttf")).is_err());
    }

    #[test]
    fn configured_font_is_used_for_measurement() {
        let m = TextMeasurer::discover(Some(&fixture_font()));
        assert!(m.is_exact());
        match m {
            TextMeasurer::Glyph { source, .. } => assert_eq!(source, fixture_font()),
            TextMeasurer::Estimate => unreachable!(),
        }
    }

    #[test]
    fn glyph_widths_are_in_points() {
        let m = TextMeasurer::from_font_file(&fixture_font()).unwrap();
        let width = m.width_pt("MMMMMMMMMM", 10.0);
        assert!((width - 10.0 * MONO_EM * 10.0).abs() < 0.01, "measured {width}pt");
        let doubled = m.width_pt("MMMMMMMMMM", 20.0);
        assert!((doubled - 2.0 * width).abs() < 0.01);
    }

    #[test]
    fn glyph_fit_picks_the_largest_size_that_fits() {
        let m = TextMeasurer::from_font_file(&fixture_font()).unwrap();
        // Ten glyphs at 49pt are 295pt wide, at 50pt 301.03pt: one line up to 49.
        let size = fit_font_size(&m, "MMMMMMMMMM", 301.0, 100.0, &FitParams::default());
        assert_eq!(size, 49.0);
        assert_eq!(count_lines(&m, "MMMMMMMMMM", 49.0, 301.0), 1);
        assert_eq!(count_lines(&m, "MMMMMMMMMM", 50.0, 301.0), 2);
    }

    #[test]
    fn glyph_fit_is_non_increasing_with_length() {
        let m = TextMeasurer::from_font_file(&fixture_font()).unwrap();
        let params = FitParams::default();
        let mut previous = f32::MAX;
        let mut text = String::new();
        for word in "quarterly results by region and segment".split(' ').cycle().take(60) {
            text.push_str(word);
            text.push(' ');
            let size = fit_font_size(&m, text.trim_end(), 400.0, 60.0, &params);
            assert!((6.0..=200.0).contains(&size));
            assert!(size <= previous, "size grew from {previous} to {size}");
            previous = size;
        }
    }
}
