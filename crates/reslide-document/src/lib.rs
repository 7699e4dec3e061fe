// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Reslide — raster helpers, font fitting, and slide-deck output.

pub mod builder;
pub mod fontfit;
pub mod image;
pub mod pptx;
pub mod units;

pub use builder::DocumentBuilder;
pub use fontfit::{FitParams, TextMeasurer, fit_font_size};
pub use self::image::{ImageProcessor, encode_png};
pub use units::{EmuRect, Placement, SlideGeometry};
