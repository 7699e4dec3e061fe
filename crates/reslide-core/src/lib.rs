// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Reslide — Core types, coordinate mapping, configuration, and error
// definitions shared across all crates.

pub mod bbox;
pub mod config;
pub mod coords;
pub mod diagnostics;
pub mod error;
pub mod style;
pub mod types;

pub use bbox::BBox;
pub use config::{AppConfig, DocumentSettings, ReconstructionSettings};
pub use coords::CoordinateMapper;
pub use diagnostics::{FailureKind, Warning, Warnings};
pub use error::{ReslideError, Result};
pub use style::{Alignment, TextRun, TextStyle};
pub use types::*;
