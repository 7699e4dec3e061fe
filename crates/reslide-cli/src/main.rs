// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Reslide — rebuild flat slide renders into editable slide decks.
//
// Entry point. Initialises logging, loads configuration, wires backends, and
// runs the requested command.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use reslide_core::error::{ReslideError, Result};
use reslide_core::{AppConfig, EditableImage, Warnings};
use reslide_document::DocumentBuilder;
use reslide_engine::{Backends, ReconstructionService, ServiceConfig};
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "reslide")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Rebuild rendered slides into an editable slide deck", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconstruct images into one deck, one slide per image
    Reconstruct {
        /// Rendered slide images, in slide order
        #[arg(required = true)]
        images: Vec<PathBuf>,

        /// Deck to write
        #[arg(long, short, default_value = "deck.pptx")]
        output: PathBuf,

        /// TOML configuration file
        #[arg(long, short, env = "RESLIDE_CONFIG")]
        config: Option<PathBuf>,

        /// Also write the element trees as JSON
        #[arg(long)]
        tree: Option<PathBuf>,

        /// Override the maximum recursion depth
        #[arg(long = "max-depth")]
        max_depth: Option<u32>,

        /// Use only in-process backends
        #[arg(long)]
        offline: bool,

        /// Directory holding the local OCR models
        #[cfg(feature = "ocr")]
        #[arg(long = "ocr-models", env = "RESLIDE_OCR_MODELS")]
        ocr_models: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    tracing::info!("Reslide starting");

    match Cli::parse().command {
        Commands::Reconstruct {
            images,
            output,
            config,
            tree,
            max_depth,
            offline,
            #[cfg(feature = "ocr")]
            ocr_models,
        } => {
            let mut config = match config {
                Some(path) => AppConfig::from_toml_file(path)?,
                None => AppConfig::default(),
            };
            if let Some(depth) = max_depth {
                config.reconstruction.max_depth = depth;
                config.validate()?;
            }

            #[allow(unused_mut)]
            let mut backends = if offline {
                Backends::offline()
            } else {
                Backends::from_settings(&config.backends, &config.reconstruction)?
            };
            #[cfg(feature = "ocr")]
            if backends.ocr.is_none() {
                match reslide_backend::LocalOcrBackend::from_model_dir(ocr_models.as_deref()) {
                    Ok(engine) => backends.ocr = Some(Arc::new(engine)),
                    Err(err) => warn!(error = %err, "local OCR unavailable"),
                }
            }
            if backends.layout.is_none() && backends.ocr.is_none() {
                warn!("no layout or OCR backend configured; slides will hold only their background");
            }

            reconstruct(&config, &backends, &images, &output, tree.as_deref()).await
        }
    }
}

async fn reconstruct(
    config: &AppConfig,
    backends: &Backends,
    images: &[PathBuf],
    output: &Path,
    tree: Option<&Path>,
) -> Result<()> {
    let service = ReconstructionService::new(Arc::new(ServiceConfig::from_app_config(config, backends)?));

    let mut trees: Vec<EditableImage> = Vec::with_capacity(images.len());
    let mut warnings = Warnings::new();
    for (path, result) in images.iter().zip(service.reconstruct_batch(images).await) {
        match result {
            Ok(reconstruction) => {
                warnings.extend(reconstruction.warnings);
                trees.push(reconstruction.image);
            }
            Err(err) => error!(path = %path.display(), error = %err, "image skipped"),
        }
    }
    if trees.is_empty() {
        return Err(ReslideError::Document("no input image could be loaded".into()));
    }

    let builder = DocumentBuilder::new(config.document.clone());
    warnings.extend(builder.write_to_file(&trees, output)?);

    if let Some(tree_path) = tree {
        let plain: Vec<_> = trees.iter().map(EditableImage::to_tree).collect();
        tokio::fs::write(tree_path, serde_json::to_vec_pretty(&plain)?).await?;
        info!(path = %tree_path.display(), "element trees written");
    }

    for warning in warnings.iter() {
        eprintln!("warning: {warning}");
    }
    println!(
        "{} slide(s) written to {} ({} warning(s))",
        trees.len(),
        output.display(),
        warnings.len()
    );
    Ok(())
}
