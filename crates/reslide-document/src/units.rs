// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Slide units and slide-size clamping.
//
// OOXML measures geometry in English Metric Units (EMU): 914 400 per inch,
// 12 700 per point, 9 525 per 96-dpi pixel. A presentation's slide size must
// lie within 1..56 inches on each side.

use reslide_core::BBox;
use tracing::debug;

pub const EMU_PER_PX: i64 = 9_525;
pub const EMU_PER_PT: i64 = 12_700;
pub const EMU_PER_INCH: i64 = 914_400;

/// Smallest legal slide side (1 inch).
pub const MIN_SLIDE_EMU: i64 = 914_400;
/// Largest legal slide side (56 inches).
pub const MAX_SLIDE_EMU: i64 = 51_206_400;

/// Slide dimensions plus the mapping from a source image onto them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlideGeometry {
    pub width_emu: i64,
    pub height_emu: i64,
}

impl SlideGeometry {
    /// Slide size for a target pixel size, clamped to the legal range.
    ///
    /// A side above the maximum scales the whole slide down uniformly, keeping
    /// the aspect ratio. A side below the minimum is raised to it on its own.
    pub fn from_pixels(width_px: u32, height_px: u32) -> Self {
        let mut w = width_px.max(1) as f64 * EMU_PER_PX as f64;
        let mut h = height_px.max(1) as f64 * EMU_PER_PX as f64;
        let longest = w.max(h);
        if longest > MAX_SLIDE_EMU as f64 {
            let factor = MAX_SLIDE_EMU as f64 / longest;
            w *= factor;
            h *= factor;
            debug!(factor, "slide size downscaled to the legal maximum");
        }
        Self {
            width_emu: (w.round() as i64).clamp(MIN_SLIDE_EMU, MAX_SLIDE_EMU),
            height_emu: (h.round() as i64).clamp(MIN_SLIDE_EMU, MAX_SLIDE_EMU),
        }
    }

    /// Mapping from an image of `width` x `height` pixels onto this slide.
    pub fn placement(&self, width: u32, height: u32) -> Placement {
        Placement {
            emu_per_px_x: self.width_emu as f64 / width.max(1) as f64,
            emu_per_px_y: self.height_emu as f64 / height.max(1) as f64,
        }
    }
}

/// Per-axis scale from source pixels to slide EMU.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub emu_per_px_x: f64,
    pub emu_per_px_y: f64,
}

/// A rectangle on the slide, in EMU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmuRect {
    pub x: i64,
    pub y: i64,
    pub cx: i64,
    pub cy: i64,
}

impl EmuRect {
    pub fn width_pt(&self) -> f32 {
        (self.cx as f64 / EMU_PER_PT as f64) as f32
    }

    pub fn height_pt(&self) -> f32 {
        (self.cy as f64 / EMU_PER_PT as f64) as f32
    }
}

impl Placement {
    /// Convert a root-space pixel box to slide EMU. Extents are at least 1 EMU.
    pub fn rect(&self, bbox: &BBox) -> EmuRect {
        EmuRect {
            x: (bbox.x0 * self.emu_per_px_x).round() as i64,
            y: (bbox.y0 * self.emu_per_px_y).round() as i64,
            cx: ((bbox.width() * self.emu_per_px_x).round() as i64).max(1),
            cy: ((bbox.height() * self.emu_per_px_y).round() as i64).max(1),
        }
    }
}
