// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Office Open XML presentation writer.

pub mod package;
pub mod parts;
pub mod xml;

pub use package::{DeckPackage, MediaStore, SlidePart};
