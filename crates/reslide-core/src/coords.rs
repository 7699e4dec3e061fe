// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Local <-> global bounding-box transforms between a cropped child raster
// and the root image it was cut from.

use crate::bbox::BBox;

/// Pure coordinate transforms between a child image's pixel space and the
/// space its parent region lives in.
///
/// A child raster of native size `(w, h)` was cropped from `parent_bbox`.
/// A box in the child's pixels maps to the parent's space by scaling with
/// `parent_bbox.size / (w, h)` and then translating by `parent_bbox.origin`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CoordinateMapper;

impl CoordinateMapper {
    /// Map `child_bbox` (child pixel space) into the parent/global space.
    pub fn local_to_global(
        child_bbox: &BBox,
        parent_bbox: &BBox,
        child_native_size: (u32, u32),
    ) -> BBox {
        let (sx, sy) = Self::scale_factors(parent_bbox, child_native_size);
        let (ox, oy) = parent_bbox.origin();
        child_bbox.scale(sx, sy).translate(ox, oy)
    }

    /// Inverse of [`local_to_global`](Self::local_to_global).
    pub fn global_to_local(
        global_bbox: &BBox,
        parent_bbox: &BBox,
        child_native_size: (u32, u32),
    ) -> BBox {
        let (sx, sy) = Self::scale_factors(parent_bbox, child_native_size);
        let (ox, oy) = parent_bbox.origin();
        let inv = |s: f64| if s == 0.0 { 0.0 } else { 1.0 / s };
        global_bbox.translate(-ox, -oy).scale(inv(sx), inv(sy))
    }

    /// Identity parameters for a root image: the parent box is the image itself.
    pub fn root_parent(width: u32, height: u32) -> BBox {
        BBox::full(width, height)
    }

    fn scale_factors(parent_bbox: &BBox, (w, h): (u32, u32)) -> (f64, f64) {
        let sx = if w == 0 { 1.0 } else { parent_bbox.width() / w as f64 };
        let sy = if h == 0 { 1.0 } else { parent_bbox.height() / h as f64 };
        (sx, sy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_transform_is_identity() {
        let b = BBox::new(12.0, 34.0, 560.0, 78.0);
        let parent = CoordinateMapper::root_parent(1920, 1080);
        let g = CoordinateMapper::local_to_global(&b, &parent, (1920, 1080));
        assert!(g.approx_eq(&b, 1e-9));
    }

    #[test]
    fn child_box_is_scaled_then_translated() {
        // A 450x400 crop taken from a 900x800 region at (1000, 200).
        let parent = BBox::new(1000.0, 200.0, 1900.0, 1000.0);
        let child = BBox::new(10.0, 20.0, 110.0, 70.0);
        let g = CoordinateMapper::local_to_global(&child, &parent, (450, 400));
        assert!(g.approx_eq(&BBox::new(1020.0, 240.0, 1220.0, 340.0), 1e-9));
    }

    #[test]
    fn round_trip_over_a_grid_of_parameters() {
        let parents = [
            BBox::new(0.0, 0.0, 1920.0, 1080.0),
            BBox::new(1000.0, 200.0, 1900.0, 1000.0),
            BBox::new(13.7, 91.1, 513.3, 300.9),
        ];
        let sizes = [(1920, 1080), (900, 800), (333, 77)];
        let boxes = [
            BBox::new(0.0, 0.0, 1.0, 1.0),
            BBox::new(5.5, 6.25, 300.0, 70.0),
            BBox::new(100.0, 40.0, 101.5, 41.5),
        ];
        for parent in &parents {
            for &size in &sizes {
                for b in &boxes {
                    let g = CoordinateMapper::local_to_global(b, parent, size);
                    let back = CoordinateMapper::global_to_local(&g, parent, size);
                    assert!(back.approx_eq(b, 1e-6), "{b:?} -> {g:?} -> {back:?}");
                }
            }
        }
    }
}
