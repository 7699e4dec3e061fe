// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Reconstruction service — the recursive orchestrator.
//
// One call turns one raster into an `EditableImage` tree:
//
//   load → extract → crop every element → clean background → styles
//        → decompose eligible children (concurrently, bounded) → done
//
// Only a raster that cannot be loaded fails the call. Every other failure
// becomes a `Warning` next to a best-effort tree. Each branch writes into its
// own directory under `output_dir`, so concurrent branches never collide.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::{FutureExt, StreamExt, stream};
use image::DynamicImage;
use reslide_core::error::{ReslideError, Result};
use reslide_core::{
    BBox, CoordinateMapper, EditableElement, EditableImage, ElementIndex, ElementType,
    FailureKind, ReconstructionSettings, TextStyle, Warning, Warnings,
};
use reslide_document::ImageProcessor;
use serde_json::Value;
use tracing::{Instrument, debug, info, info_span, instrument, warn};

use crate::config::ServiceConfig;
use crate::style::StyleTarget;

/// File name of a branch's clean background inside its work directory.
pub const CLEAN_BACKGROUND_FILE: &str = "clean.png";

/// A finished tree and what went wrong while building it.
#[derive(Debug, Clone)]
pub struct Reconstruction {
    pub image: EditableImage,
    pub warnings: Warnings,
}

/// Whether `element`, inside a `parent_width` x `parent_height` image, is
/// decomposed further: not yet decomposed, of a recursable type, at least
/// `min_image_size` on both sides and `min_image_area` in area, and covering
/// no more than `max_child_coverage_ratio` of its parent.
pub fn should_recurse(
    element: &EditableElement,
    parent_width: u32,
    parent_height: u32,
    settings: &ReconstructionSettings,
) -> bool {
    if element.has_children() || element.is_decomposed() || !element.element_type.is_recursable() {
        return false;
    }
    let bbox = &element.bbox;
    let min_side = settings.min_image_size as f64;
    if bbox.width() < min_side || bbox.height() < min_side {
        return false;
    }
    if bbox.area() < settings.min_image_area as f64 {
        return false;
    }
    let parent_area = parent_width as f64 * parent_height as f64;
    parent_area > 0.0 && bbox.area() / parent_area <= settings.max_child_coverage_ratio
}

/// One unit of recursive work.
#[derive(Debug, Clone)]
struct Branch {
    path: PathBuf,
    /// Region of the root image this raster covers.
    parent_bbox: Option<BBox>,
    depth: u32,
    type_hint: Option<ElementType>,
    parent_id: Option<String>,
}

/// A crop written for one element.
struct Crop {
    path: PathBuf,
    /// Pixel rectangle actually cut, in the current image's space.
    rect: BBox,
}

/// Drives extraction, inpainting, style inference and recursion.
#[derive(Debug, Clone)]
pub struct ReconstructionService {
    config: Arc<ServiceConfig>,
}

impl ReconstructionService {
    pub fn new(config: Arc<ServiceConfig>) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Reconstruct the raster at `image_path` into a tree.
    ///
    /// Fails only if the raster cannot be loaded.
    #[instrument(skip(self), fields(path = %image_path.display()))]
    pub async fn reconstruct(&self, image_path: &Path) -> Result<Reconstruction> {
        let result = self
            .process(Branch {
                path: image_path.to_path_buf(),
                parent_bbox: None,
                depth: 0,
                type_hint: None,
                parent_id: None,
            })
            .await?;
        info!(
            elements = result.image.total_elements(),
            warnings = result.warnings.len(),
            "reconstruction complete"
        );
        Ok(result)
    }

    /// Reconstruct independent rasters, at most `batch_concurrency` at a time.
    /// Results come back in input order.
    pub async fn reconstruct_batch(&self, paths: &[PathBuf]) -> Vec<Result<Reconstruction>> {
        let limit = self.config.settings.batch_concurrency.max(1);
        info!(images = paths.len(), limit, "batch reconstruction started");
        stream::iter(paths.iter().map(|path| self.reconstruct(path)))
            .buffered(limit)
            .collect()
            .await
    }

    fn process(&self, branch: Branch) -> BoxFuture<'_, Result<Reconstruction>> {
        let span = info_span!("process", depth = branch.depth, hint = ?branch.type_hint);
        async move { self.process_branch(branch).await }
            .instrument(span)
            .boxed()
    }

    async fn process_branch(&self, branch: Branch) -> Result<Reconstruction> {
        let settings = &self.config.settings;
        let mut warnings = Warnings::new();

        // LOADED
        let load_path = branch.path.clone();
        let raster = blocking(move || ImageProcessor::open(&load_path)).await??;
        let (width, height) = raster.dimensions();
        let raster = Arc::new(raster.into_dynamic());
        let parent_bbox = branch
            .parent_bbox
            .unwrap_or_else(|| CoordinateMapper::root_parent(width, height));

        let mut image = EditableImage::new(&branch.path, width, height, branch.depth);
        image.parent_id = branch.parent_id.clone();
        let work_dir = settings.output_dir.join(&image.id);
        tokio::fs::create_dir_all(&work_dir).await?;

        // EXTRACTED
        let raw = match self.config.extractors.select(branch.type_hint) {
            None => {
                warnings.push(
                    Warning::new(FailureKind::Extraction, "no extractor registered")
                        .with_image(&image.id),
                );
                Vec::new()
            }
            Some(extractor) => {
                image
                    .metadata
                    .insert("extractor".into(), Value::from(extractor.name()));
                match extractor.extract(&branch.path, branch.type_hint, &work_dir).await {
                    Ok(extraction) => {
                        for note in extraction.context.degraded {
                            warnings.push(
                                Warning::new(FailureKind::Extraction, note).with_image(&image.id),
                            );
                        }
                        extraction.elements
                    }
                    Err(err) => {
                        warn!(error = %err, "extraction failed, continuing with no elements");
                        warnings.push(
                            Warning::from_error(FailureKind::Extraction, &err).with_image(&image.id),
                        );
                        Vec::new()
                    }
                }
            }
        };

        let mut indices = Vec::with_capacity(raw.len());
        for raw in raw {
            let local = raw.bbox.clamp_to(width as f64, height as f64);
            if local.is_degenerate() {
                debug!(kind = %raw.element_type, "dropping element outside the image");
                continue;
            }
            let global = CoordinateMapper::local_to_global(&local, &parent_bbox, (width, height));
            let mut element = EditableElement::new(raw.element_type, local, global);
            element.content = raw.content;
            element.image_path = raw.image_path;
            element.metadata = raw.metadata;
            indices.push(image.push_element(element));
        }

        let crops = self
            .write_crops(&image, &indices, Arc::clone(&raster), &work_dir)
            .await?;
        for (&idx, crop) in indices.iter().zip(&crops) {
            let element = image.element_mut(idx);
            if element.image_path.is_none() {
                element.image_path = crop.as_ref().map(|c| c.path.clone());
            }
        }
        debug!(elements = indices.len(), "elements placed");

        // BACKGROUND_GENERATED
        if !indices.is_empty() {
            self.clean_background(&mut image, &indices, &raster, branch.type_hint, &work_dir, &mut warnings)
                .await;
        }

        if let Some(styler) = &self.config.styles {
            let targets: Vec<StyleTarget> = indices
                .iter()
                .map(|&idx| image.element(idx))
                .filter(|e| e.element_type.is_text_like() || e.element_type == ElementType::TableCell)
                .map(|e| StyleTarget {
                    id: e.id.clone(),
                    text: e.content.clone(),
                    bbox: e.bbox,
                })
                .collect();
            if !targets.is_empty() {
                match styler.extract_styles(&raster, &targets).await {
                    Ok(styles) => {
                        for (id, style) in styles {
                            if let Some(idx) = image.find(&id) {
                                style.store(&mut image.element_mut(idx).metadata);
                            }
                        }
                    }
                    Err(err) => {
                        warn!(error = %err, "style extraction failed, using defaults");
                        warnings.push(
                            Warning::from_error(FailureKind::StyleExtraction, &err).with_image(&image.id),
                        );
                        let fallback = TextStyle::default();
                        for target in &targets {
                            if let Some(idx) = image.find(&target.id) {
                                fallback.store(&mut image.element_mut(idx).metadata);
                            }
                        }
                    }
                }
            }
        }

        // CHILDREN_PROCESSED
        if branch.depth + 1 < settings.max_depth {
            let mut children = Vec::new();
            for (&idx, crop) in indices.iter().zip(&crops) {
                let element = image.element(idx);
                let Some(crop) = crop else { continue };
                if !should_recurse(element, width, height, settings) {
                    continue;
                }
                children.push((
                    idx,
                    element.id.clone(),
                    Branch {
                        path: crop.path.clone(),
                        parent_bbox: Some(CoordinateMapper::local_to_global(
                            &crop.rect,
                            &parent_bbox,
                            (width, height),
                        )),
                        depth: branch.depth + 1,
                        type_hint: Some(element.element_type),
                        parent_id: Some(image.id.clone()),
                    },
                ));
            }
            self.decompose(&mut image, children, &mut warnings).await;
        }

        Ok(Reconstruction { image, warnings })
    }

    /// Crop every element out of the raster and save it as `{id}.png`.
    async fn write_crops(
        &self,
        image: &EditableImage,
        indices: &[ElementIndex],
        raster: Arc<DynamicImage>,
        work_dir: &Path,
    ) -> Result<Vec<Option<Crop>>> {
        let jobs: Vec<(BBox, PathBuf)> = indices
            .iter()
            .map(|&idx| {
                let el = image.element(idx);
                (el.bbox, work_dir.join(format!("{}.png", el.id)))
            })
            .collect();
        blocking(move || {
            let (w, h) = (raster.width(), raster.height());
            jobs.into_iter()
                .map(|(bbox, path)| {
                    let (x, y, cw, ch) = bbox.to_pixel_rect(w, h)?;
                    let crop = ImageProcessor::from_dynamic(raster.crop_imm(x, y, cw, ch));
                    match crop.save(&path) {
                        Ok(()) => Some(Crop {
                            path,
                            rect: BBox::from_origin_size(x as f64, y as f64, cw as f64, ch as f64),
                        }),
                        Err(err) => {
                            warn!(path = %path.display(), error = %err, "could not save element crop");
                            None
                        }
                    }
                })
                .collect()
        })
        .await
    }

    async fn clean_background(
        &self,
        image: &mut EditableImage,
        indices: &[ElementIndex],
        raster: &DynamicImage,
        type_hint: Option<ElementType>,
        work_dir: &Path,
        warnings: &mut Warnings,
    ) {
        let Some(provider) = self.config.inpainters.select(type_hint) else {
            debug!("no inpainter registered, background left unset");
            return;
        };
        let regions: Vec<BBox> = indices.iter().map(|&i| image.element(i).bbox).collect();
        let types: Vec<ElementType> = indices.iter().map(|&i| image.element(i).element_type).collect();
        let options = self.config.inpaint_options();

        let clean = match provider.try_inpaint(raster, &regions, &types, &options).await {
            Ok(clean) => clean,
            Err(err) => {
                warn!(provider = provider.name(), error = %err, "inpainting failed, raw image kept");
                warnings.push(Warning::from_error(FailureKind::Inpaint, &err).with_image(&image.id));
                return;
            }
        };
        let path = work_dir.join(CLEAN_BACKGROUND_FILE);
        let save_path = path.clone();
        match blocking(move || ImageProcessor::from_dynamic(clean).save(&save_path)).await {
            Ok(Ok(())) => {
                debug!(provider = provider.name(), "clean background written");
                image.clean_background_path = Some(path);
            }
            Ok(Err(err)) | Err(err) => {
                warnings.push(Warning::from_error(FailureKind::Inpaint, &err).with_image(&image.id));
            }
        }
    }

    /// Recurse into `children` concurrently and attach the results in element
    /// order. A failed branch leaves its element flat.
    async fn decompose(
        &self,
        image: &mut EditableImage,
        children: Vec<(ElementIndex, String, Branch)>,
        warnings: &mut Warnings,
    ) {
        if children.is_empty() {
            return;
        }
        let limit = self.config.settings.max_concurrent_children.max(1);
        info!(children = children.len(), limit, "decomposing child regions");

        let mut results: Vec<_> = stream::iter(children.into_iter().map(|(idx, id, branch)| {
            async move { (idx, id, self.process(branch).await) }
        }))
        .buffer_unordered(limit)
        .collect()
        .await;
        results.sort_by_key(|(idx, _, _)| idx.get());

        for (idx, element_id, result) in results {
            let outcome = result.and_then(|child| {
                warnings.extend(child.warnings);
                image.attach_decomposition(idx, child.image)
            });
            if let Err(err) = outcome {
                warn!(element = %element_id, error = %err, "child branch failed, element kept flat");
                warnings.push(
                    Warning::new(FailureKind::Recursion, err.to_string())
                        .with_image(&image.id)
                        .with_element(element_id),
                );
            }
        }
    }
}

/// Run blocking image work off the async worker threads.
pub(crate) async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|err| ReslideError::Image(format!("image task failed: {err}")))
}
