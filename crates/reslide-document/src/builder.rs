// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// DocumentBuilder: element trees in, slide deck out.
//
// One slide per top-level image. The image's clean background (or the raw
// image when there is none) fills the slide background, and every top-level
// element becomes exactly one shape:
//
// - text-like elements and table cells: a text box with a fitted font size
// - decomposed elements: a group of their background picture and children
// - other leaves: a picture of their cropped raster
//
// A shape that cannot be placed is replaced by a dashed placeholder and a
// `Render` warning; the deck is still produced.

use std::collections::HashMap;
use std::path::Path;

use reslide_core::config::DocumentSettings;
use reslide_core::error::{ReslideError, Result};
use reslide_core::style::{Alignment, TextStyle};
use reslide_core::{EditableImage, ElementIndex, ElementType, FailureKind, Warning, Warnings};
use tracing::{debug, info, instrument};

use crate::fontfit::{FitParams, TextMeasurer, fit_font_size};
use crate::pptx::package::{DeckPackage, MediaStore, SlidePart};
use crate::pptx::xml::{self, TextBody};
use crate::units::{Placement, SlideGeometry};

/// Renders reconstructed trees into a presentation.
#[derive(Debug)]
pub struct DocumentBuilder {
    settings: DocumentSettings,
    measurer: TextMeasurer,
    params: FitParams,
}

impl DocumentBuilder {
    /// Builder measuring text with the configured font, a system font, or
    /// the width estimate, whichever is found first.
    pub fn new(settings: DocumentSettings) -> Self {
        let measurer = TextMeasurer::discover(settings.font_path.as_deref());
        Self::with_measurer(settings, measurer)
    }

    pub fn with_measurer(settings: DocumentSettings, measurer: TextMeasurer) -> Self {
        let params = FitParams::from(&settings);
        Self {
            settings,
            measurer,
            params,
        }
    }

    pub fn settings(&self) -> &DocumentSettings {
        &self.settings
    }

    /// Slide size for `images`: the configured target, else the first image.
    pub fn geometry(&self, images: &[EditableImage]) -> Option<SlideGeometry> {
        let (w, h) = self
            .settings
            .target_slide_px
            .or_else(|| images.first().map(|img| (img.width, img.height)))?;
        Some(SlideGeometry::from_pixels(w, h))
    }

    /// Render `images` into presentation bytes plus the warnings for every
    /// shape that had to be degraded.
    #[instrument(skip_all, fields(images = images.len()))]
    pub fn build(&self, images: &[EditableImage]) -> Result<(Vec<u8>, Warnings)> {
        let geometry = self
            .geometry(images)
            .ok_or_else(|| ReslideError::Document("no images to render".into()))?;
        let mut deck = DeckPackage::new(
            geometry.width_emu,
            geometry.height_emu,
            self.settings.font_family.clone(),
        );
        let mut warnings = Warnings::new();
        for image in images {
            let placement = geometry.placement(image.width, image.height);
            let slide = SlideWriter::new(self, image, placement, &mut deck.media, &mut warnings)
                .render();
            deck.push_slide(slide);
        }
        info!(
            slides = deck.slide_count(),
            width_emu = geometry.width_emu,
            height_emu = geometry.height_emu,
            warnings = warnings.len(),
            "deck rendered"
        );
        Ok((deck.finish()?, warnings))
    }

    /// Render and write the deck to `path`, creating parent directories.
    pub fn write_to_file(&self, images: &[EditableImage], path: impl AsRef<Path>) -> Result<Warnings> {
        let path = path.as_ref();
        let (bytes, warnings) = self.build(images)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, bytes)?;
        info!(path = %path.display(), "deck saved");
        Ok(warnings)
    }
}

/// Accumulates one slide's shape tree and relationships.
struct SlideWriter<'a> {
    builder: &'a DocumentBuilder,
    image: &'a EditableImage,
    placement: Placement,
    store: &'a mut MediaStore,
    warnings: &'a mut Warnings,
    rids: HashMap<String, String>,
    media: Vec<String>,
    shapes: String,
    next_id: u32,
}

impl<'a> SlideWriter<'a> {
    fn new(
        builder: &'a DocumentBuilder,
        image: &'a EditableImage,
        placement: Placement,
        store: &'a mut MediaStore,
        warnings: &'a mut Warnings,
    ) -> Self {
        Self {
            builder,
            image,
            placement,
            store,
            warnings,
            rids: HashMap::new(),
            media: Vec::new(),
            shapes: String::new(),
            // Id 1 is the shape tree itself.
            next_id: 2,
        }
    }

    fn render(mut self) -> SlidePart {
        let image = self.image;
        let background_path = image
            .clean_background_path
            .as_deref()
            .unwrap_or(image.image_path.as_path());
        let background = match self.embed(background_path) {
            Ok(rid) => Some(xml::picture_background(&rid)),
            Err(err) => {
                self.warn(None, format!("slide background unavailable: {err}"));
                None
            }
        };
        for &idx in image.element_indices() {
            self.element(idx);
        }
        SlidePart {
            xml: xml::slide(background.as_deref(), &self.shapes),
            media: self.media,
        }
    }

    fn shape_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn warn(&mut self, element_id: Option<&str>, message: String) {
        let mut warning = Warning::new(FailureKind::Render, message).with_image(&self.image.id);
        if let Some(id) = element_id {
            warning = warning.with_element(id);
        }
        self.warnings.push(warning);
    }

    /// Relationship id of the picture at `path`, embedding it on first use.
    fn embed(&mut self, path: &Path) -> Result<String> {
        let data = std::fs::read(path).map_err(|err| {
            ReslideError::Render(format!("cannot read {}: {err}", path.display()))
        })?;
        let name = self.store.add(data)?;
        if let Some(rid) = self.rids.get(&name) {
            return Ok(rid.clone());
        }
        self.media.push(name.clone());
        // rId1 is the slide layout.
        let rid = format!("rId{}", self.media.len() + 1);
        self.rids.insert(name, rid.clone());
        Ok(rid)
    }

    fn placeholder(&mut self, idx: ElementIndex, reason: String) {
        let image = self.image;
        let el = image.element(idx);
        let rect = self.placement.rect(&el.bbox_global);
        let name = format!("Placeholder {}", el.element_type.as_str());
        let id = self.shape_id();
        self.shapes.push_str(&xml::placeholder(id, &name, &rect));
        self.warn(Some(&el.id), reason);
    }

    fn element(&mut self, idx: ElementIndex) {
        let image = self.image;
        let el = image.element(idx);
        if el.bbox_global.is_degenerate() {
            let reason = format!("element {} has a degenerate box", el.id);
            self.placeholder(idx, reason);
            return;
        }
        if el.has_children() {
            self.group(idx);
        } else if el.element_type.is_text_like() || el.element_type == ElementType::TableCell {
            self.text(idx);
        } else {
            self.picture(idx);
        }
    }

    fn group(&mut self, idx: ElementIndex) {
        let image = self.image;
        let el = image.element(idx);
        let rect = self.placement.rect(&el.bbox_global);
        let id = self.shape_id();
        self.shapes
            .push_str(&xml::group_open(id, &format!("Group {}", el.element_type.as_str()), &rect));
        let background = el
            .inpainted_background_path
            .as_deref()
            .or(el.image_path.as_deref());
        match background.map(|path| self.embed(path)) {
            Some(Ok(rid)) => {
                let pic_id = self.shape_id();
                self.shapes.push_str(&xml::picture(pic_id, "Background", &el.id, &rect, &rid));
            }
            Some(Err(err)) => {
                self.warn(Some(&el.id), format!("group background unavailable: {err}"));
            }
            None => debug!(element = %el.id, "decomposed element has no background raster"),
        }
        for &child in el.children() {
            self.element(child);
        }
        self.shapes.push_str(xml::GROUP_CLOSE);
    }

    fn picture(&mut self, idx: ElementIndex) {
        let image = self.image;
        let el = image.element(idx);
        let Some(path) = el.image_path.as_deref() else {
            let reason = format!("{} element {} has no raster", el.element_type.as_str(), el.id);
            self.placeholder(idx, reason);
            return;
        };
        match self.embed(path) {
            Ok(rid) => {
                let rect = self.placement.rect(&el.bbox_global);
                let name = format!("Picture {}", el.element_type.as_str());
                let id = self.shape_id();
                self.shapes.push_str(&xml::picture(id, &name, &el.id, &rect, &rid));
            }
            Err(err) => self.placeholder(idx, err.to_string()),
        }
    }

    fn text(&mut self, idx: ElementIndex) {
        let (image, builder) = (self.image, self.builder);
        let el = image.element(idx);
        let Some(text) = el.content.as_deref().filter(|t| !t.trim().is_empty()) else {
            let reason = format!("text element {} has no content", el.id);
            self.placeholder(idx, reason);
            return;
        };
        let settings = &builder.settings;
        let rect = self
            .placement
            .rect(&el.bbox_global.expand_ratio(settings.bbox_expand_ratio));
        let style = TextStyle::from_metadata(&el.metadata).unwrap_or_default();
        let size_pt = fit_font_size(
            &builder.measurer,
            text,
            rect.width_pt(),
            rect.height_pt(),
            &builder.params,
        );
        let cell = el.element_type == ElementType::TableCell;
        let body = TextBody {
            text,
            style: &style,
            size_pt,
            font_family: &settings.font_family,
            line_spacing: settings.line_spacing,
            alignment: cell.then_some(Alignment::Center),
            anchor: if cell { "ctr" } else { "t" },
        };
        debug!(element = %el.id, size_pt, "text box fitted");
        let name = format!("TextBox {}", el.element_type.as_str());
        let id = self.shape_id();
        self.shapes.push_str(&xml::text_box(id, &name, &rect, &body));
    }
}
