// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Style inference through a vision-capable model.

use std::sync::Arc;

use async_trait::async_trait;
use image::DynamicImage;
use reslide_backend::{RunVerdict, StyleBackend, StyleQuery, StyleVerdict};
use reslide_core::error::Result;
use reslide_core::style::normalize_hex;
use reslide_core::{Alignment, TextRun, TextStyle};
use tracing::{debug, instrument, warn};

use super::{StyleTarget, TextAttributeExtractor};

/// [`TextAttributeExtractor`] backed by a [`StyleBackend`].
#[derive(Clone)]
pub struct VisionStyleExtractor {
    backend: Arc<dyn StyleBackend>,
}

impl std::fmt::Debug for VisionStyleExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VisionStyleExtractor")
            .field("backend", &self.backend.name())
            .finish()
    }
}

impl VisionStyleExtractor {
    pub fn new(backend: Arc<dyn StyleBackend>) -> Self {
        Self { backend }
    }
}

/// Turn a model verdict into a style. Unknown or malformed fields take the
/// default; run colours fall back to the element colour.
pub fn verdict_to_style(verdict: &StyleVerdict) -> TextStyle {
    let default = TextStyle::default();
    let color_hex = verdict
        .color
        .as_deref()
        .and_then(normalize_hex)
        .unwrap_or(default.color_hex);
    let runs = if verdict.runs.len() > 1 {
        verdict
            .runs
            .iter()
            .filter(|r| !r.text.is_empty())
            .map(|r| run_from(r, &color_hex))
            .collect()
    } else {
        Vec::new()
    };
    TextStyle {
        bold: verdict.bold.unwrap_or(false),
        italic: verdict.italic.unwrap_or(false),
        underline: verdict.underline.unwrap_or(false),
        alignment: verdict
            .alignment
            .as_deref()
            .and_then(Alignment::from_label)
            .unwrap_or_default(),
        color_hex,
        runs,
    }
}

fn run_from(run: &RunVerdict, element_color: &str) -> TextRun {
    TextRun {
        text: run.text.clone(),
        color_hex: run
            .color
            .as_deref()
            .and_then(normalize_hex)
            .or_else(|| Some(element_color.to_string())),
        bold: run.bold.unwrap_or(false),
        italic: run.italic.unwrap_or(false),
    }
}

#[async_trait]
impl TextAttributeExtractor for VisionStyleExtractor {
    fn name(&self) -> &str {
        "vision"
    }

    #[instrument(skip_all, fields(targets = targets.len(), backend = self.backend.name()))]
    async fn extract_styles(
        &self,
        image: &DynamicImage,
        targets: &[StyleTarget],
    ) -> Result<Vec<(String, TextStyle)>> {
        if targets.is_empty() {
            return Ok(Vec::new());
        }
        let queries: Vec<StyleQuery> = targets
            .iter()
            .map(|t| StyleQuery {
                id: t.id.clone(),
                text: t.text.clone(),
                bbox: t.bbox,
            })
            .collect();
        let verdicts = self.backend.analyze(image, &queries).await?;

        let mut styles = Vec::with_capacity(verdicts.len());
        for verdict in &verdicts {
            if !targets.iter().any(|t| t.id == verdict.id) {
                warn!(id = %verdict.id, "style verdict for unknown element ignored");
                continue;
            }
            styles.push((verdict.id.clone(), verdict_to_style(verdict)));
        }
        debug!(answered = styles.len(), "styles inferred");
        Ok(styles)
    }
}

#[cfg(test)]
mod tests {
    use reslide_backend::stub::{FailingBackend, StaticStyleBackend};
    use reslide_core::BBox;

    use super::*;

    fn target(id: &str) -> StyleTarget {
        StyleTarget {
            id: id.into(),
            text: Some("Quarterly results".into()),
            bbox: BBox::new(0.0, 0.0, 100.0, 20.0),
        }
    }

    #[test]
    fn malformed_fields_take_defaults() {
        let verdict = StyleVerdict {
            id: "a".into(),
            color: Some("not a colour".into()),
            alignment: Some("centre".into()),
            bold: Some(true),
            ..StyleVerdict::default()
        };
        let style = verdict_to_style(&verdict);
        assert_eq!(style.color_hex, "#000000");
        assert_eq!(style.alignment, Alignment::Center);
        assert!(style.bold && !style.italic);
    }

    #[test]
    fn mixed_runs_inherit_element_colour() {
        let verdict = StyleVerdict {
            id: "a".into(),
            color: Some("1f3864".into()),
            runs: vec![
                RunVerdict {
                    text: "Revenue ".into(),
                    ..RunVerdict::default()
                },
                RunVerdict {
                    text: "+12%".into(),
                    color: Some("#0a0".into()),
                    italic: Some(true),
                    ..RunVerdict::default()
                },
            ],
            ..StyleVerdict::default()
        };
        let style = verdict_to_style(&verdict);
        assert!(style.is_mixed());
        assert_eq!(style.runs[0].color_hex.as_deref(), Some("#1F3864"));
        assert_eq!(style.runs[1].color_hex.as_deref(), Some("#00AA00"));
        assert!(style.runs[1].italic);
    }

    #[tokio::test]
    async fn every_target_gets_a_style() {
        let backend = StaticStyleBackend::new(StyleVerdict {
            color: Some("#C00000".into()),
            underline: Some(true),
            ..StyleVerdict::default()
        });
        let extractor = VisionStyleExtractor::new(Arc::new(backend));
        let image = DynamicImage::new_rgb8(100, 40);
        let styles = extractor
            .extract_styles(&image, &[target("a"), target("b")])
            .await
            .unwrap();
        assert_eq!(styles.len(), 2);
        assert_eq!(styles[1].0, "b");
        assert_eq!(styles[1].1.color_hex, "#C00000");
        assert!(styles[1].1.underline);
    }

    #[tokio::test]
    async fn backend_failure_propagates() {
        let extractor = VisionStyleExtractor::new(Arc::new(FailingBackend::new("quota")));
        let image = DynamicImage::new_rgb8(10, 10);
        assert!(extractor.extract_styles(&image, &[target("a")]).await.is_err());
    }
}
