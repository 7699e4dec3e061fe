// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Axis-aligned pixel rectangles and the overlap measures used by the
// extraction merge and the recursion predicate.

use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle `(x0, y0, x1, y1)` in some image's pixel space.
///
/// `BBox` is an immutable value: every transformation returns a new box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl BBox {
    /// Build a box from two corners. Corners are normalised so that
    /// `x0 <= x1` and `y0 <= y1`.
    pub fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self {
            x0: x0.min(x1),
            y0: y0.min(y1),
            x1: x0.max(x1),
            y1: y0.max(y1),
        }
    }

    /// Build a box from an origin and a size.
    pub fn from_origin_size(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self::new(x, y, x + width, y + height)
    }

    /// Box covering a whole `width` x `height` image.
    pub fn full(width: u32, height: u32) -> Self {
        Self::new(0.0, 0.0, width as f64, height as f64)
    }

    pub fn width(&self) -> f64 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f64 {
        self.y1 - self.y0
    }

    pub fn area(&self) -> f64 {
        self.width().max(0.0) * self.height().max(0.0)
    }

    /// Top-left corner.
    pub fn origin(&self) -> (f64, f64) {
        (self.x0, self.y0)
    }

    /// `(width, height)`.
    pub fn size(&self) -> (f64, f64) {
        (self.width(), self.height())
    }

    /// True when the box encloses no area.
    pub fn is_degenerate(&self) -> bool {
        self.width() <= 0.0 || self.height() <= 0.0 || !self.is_finite()
    }

    fn is_finite(&self) -> bool {
        self.x0.is_finite() && self.y0.is_finite() && self.x1.is_finite() && self.y1.is_finite()
    }

    /// Scale every coordinate by `(sx, sy)` about the origin.
    pub fn scale(&self, sx: f64, sy: f64) -> Self {
        Self::new(self.x0 * sx, self.y0 * sy, self.x1 * sx, self.y1 * sy)
    }

    /// Shift the box by `(dx, dy)`.
    pub fn translate(&self, dx: f64, dy: f64) -> Self {
        Self::new(self.x0 + dx, self.y0 + dy, self.x1 + dx, self.y1 + dy)
    }

    /// Grow the box by `px` on every side.
    pub fn expand(&self, px: f64) -> Self {
        Self::new(self.x0 - px, self.y0 - px, self.x1 + px, self.y1 + px)
    }

    /// Grow the box about its centre by `ratio` of its own size
    /// (`0.01` adds 1% to the width and to the height).
    pub fn expand_ratio(&self, ratio: f64) -> Self {
        let dx = self.width() * ratio / 2.0;
        let dy = self.height() * ratio / 2.0;
        Self::new(self.x0 - dx, self.y0 - dy, self.x1 + dx, self.y1 + dy)
    }

    /// Clip the box to a `width` x `height` image.
    pub fn clamp_to(&self, width: f64, height: f64) -> Self {
        Self::new(
            self.x0.clamp(0.0, width),
            self.y0.clamp(0.0, height),
            self.x1.clamp(0.0, width),
            self.y1.clamp(0.0, height),
        )
    }

    /// Overlapping region, or `None` when the boxes are disjoint.
    pub fn intersection(&self, other: &Self) -> Option<Self> {
        let x0 = self.x0.max(other.x0);
        let y0 = self.y0.max(other.y0);
        let x1 = self.x1.min(other.x1);
        let y1 = self.y1.min(other.y1);
        if x1 > x0 && y1 > y0 {
            Some(Self { x0, y0, x1, y1 })
        } else {
            None
        }
    }

    pub fn intersection_area(&self, other: &Self) -> f64 {
        self.intersection(other).map_or(0.0, |r| r.area())
    }

    /// Fraction of `self` that lies inside `outer`
    /// (intersection area / own area).
    pub fn containment_in(&self, outer: &Self) -> f64 {
        let own = self.area();
        if own <= 0.0 {
            return 0.0;
        }
        self.intersection_area(outer) / own
    }

    /// Intersection area relative to the smaller of the two areas.
    pub fn intersection_ratio(&self, other: &Self) -> f64 {
        let smaller = self.area().min(other.area());
        if smaller <= 0.0 {
            return 0.0;
        }
        self.intersection_area(other) / smaller
    }

    /// Integer pixel rectangle `(x, y, width, height)` covering the box,
    /// clipped to a `width` x `height` image. Returns `None` when the
    /// clipped region is empty.
    pub fn to_pixel_rect(&self, width: u32, height: u32) -> Option<(u32, u32, u32, u32)> {
        let clipped = self.clamp_to(width as f64, height as f64);
        let x0 = clipped.x0.floor() as u32;
        let y0 = clipped.y0.floor() as u32;
        let x1 = (clipped.x1.ceil() as u32).min(width);
        let y1 = (clipped.y1.ceil() as u32).min(height);
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some((x0, y0, x1 - x0, y1 - y0))
    }

    /// Coordinates as an `[x0, y0, x1, y1]` array (wire format).
    pub fn to_array(&self) -> [f64; 4] {
        [self.x0, self.y0, self.x1, self.y1]
    }

    pub fn from_array(coords: [f64; 4]) -> Self {
        Self::new(coords[0], coords[1], coords[2], coords[3])
    }

    /// Componentwise comparison within `tolerance`.
    pub fn approx_eq(&self, other: &Self, tolerance: f64) -> bool {
        (self.x0 - other.x0).abs() <= tolerance
            && (self.y0 - other.y0).abs() <= tolerance
            && (self.x1 - other.x1).abs() <= tolerance
            && (self.y1 - other.y1).abs() <= tolerance
    }
}
