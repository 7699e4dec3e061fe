// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Recoverable-failure reporting.
//
// A reconstruction never throws for a failure it can degrade around. Each such
// failure becomes a `Warning` tagged with the stage that failed, and warnings
// travel back to the caller next to the best-effort result.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ReslideError;

/// The stage whose failure was absorbed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Layout/OCR call failed or timed out; fewer (or zero) elements.
    Extraction,
    /// Background generation failed; background left unset.
    Inpaint,
    /// A child branch failed; the element is rendered flat.
    Recursion,
    /// Style inference failed; defaults applied.
    StyleExtraction,
    /// One element could not be placed; a placeholder was drawn.
    Render,
}

impl FailureKind {
    /// What the degraded output looks like, in plain words.
    pub fn fallback(&self) -> &'static str {
        match self {
            Self::Extraction => "the region was kept with fewer detected elements",
            Self::Inpaint => "the original image is used as the background",
            Self::Recursion => "the region is placed as a single flat picture",
            Self::StyleExtraction => "text uses black, regular weight, left alignment",
            Self::Render => "a placeholder box marks the element",
        }
    }
}

/// One absorbed failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Warning {
    pub kind: FailureKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element_id: Option<String>,
    pub message: String,
}

impl Warning {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            image_id: None,
            element_id: None,
            message: message.into(),
        }
    }

    /// Warning carrying the display text of `err`.
    pub fn from_error(kind: FailureKind, err: &ReslideError) -> Self {
        Self::new(kind, err.to_string())
    }

    pub fn with_image(mut self, image_id: impl Into<String>) -> Self {
        self.image_id = Some(image_id.into());
        self
    }

    pub fn with_element(mut self, element_id: impl Into<String>) -> Self {
        self.element_id = Some(element_id.into());
        self
    }

    /// One-line summary: what failed and what the output does instead.
    pub fn summary(&self) -> String {
        let target = match (&self.element_id, &self.image_id) {
            (Some(el), _) => format!(" (element {el})"),
            (None, Some(img)) => format!(" (image {img})"),
            (None, None) => String::new(),
        };
        format!(
            "{:?} failure{target}: {}; {}",
            self.kind,
            self.message,
            self.kind.fallback()
        )
    }
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.summary())
    }
}

/// Ordered collection of warnings from one operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Warnings(Vec<Warning>);

impl Warnings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a warning and log it.
    pub fn push(&mut self, warning: Warning) {
        warn!(
            kind = ?warning.kind,
            image_id = warning.image_id.as_deref().unwrap_or("-"),
            element_id = warning.element_id.as_deref().unwrap_or("-"),
            "{}",
            warning.message
        );
        self.0.push(warning);
    }

    /// Append warnings collected elsewhere (already logged there).
    pub fn extend(&mut self, other: Warnings) {
        self.0.extend(other.0);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Warning> {
        self.0.iter()
    }

    /// Number of warnings of one kind.
    pub fn count(&self, kind: FailureKind) -> usize {
        self.0.iter().filter(|w| w.kind == kind).count()
    }

    pub fn into_vec(self) -> Vec<Warning> {
        self.0
    }
}

impl IntoIterator for Warnings {
    type Item = Warning;
    type IntoIter = std::vec::IntoIter<Warning>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_names_target_and_fallback() {
        let w = Warning::from_error(FailureKind::Inpaint, &ReslideError::Inpaint("backend down".into()))
            .with_image("img_1");
        let text = w.summary();
        assert!(text.contains("image img_1"));
        assert!(text.contains("backend down"));
        assert!(text.contains("original image"));
    }

    #[test]
    fn element_target_wins_over_image() {
        let w = Warning::new(FailureKind::Render, "missing asset")
            .with_image("img_1")
            .with_element("el_2");
        assert!(w.summary().contains("element el_2"));
    }

    #[test]
    fn counts_by_kind() {
        let mut warnings = Warnings::new();
        warnings.push(Warning::new(FailureKind::Recursion, "a"));
        warnings.push(Warning::new(FailureKind::Recursion, "b"));
        let mut more = Warnings::new();
        more.push(Warning::new(FailureKind::Render, "c"));
        warnings.extend(more);
        assert_eq!(warnings.len(), 3);
        assert_eq!(warnings.count(FailureKind::Recursion), 2);
        assert_eq!(warnings.count(FailureKind::Extraction), 0);
    }
}
