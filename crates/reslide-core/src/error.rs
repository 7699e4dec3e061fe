// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Reslide.

use thiserror::Error;

/// Top-level error type for all Reslide operations.
#[derive(Debug, Error)]
pub enum ReslideError {
    // -- Reconstruction errors --
    #[error("extraction failed: {0}")]
    Extraction(String),

    #[error("inpainting failed: {0}")]
    Inpaint(String),

    #[error("recursive decomposition failed: {0}")]
    Recursion(String),

    #[error("text style extraction failed: {0}")]
    Style(String),

    // -- Raster errors --
    #[error("failed to load input image {path}: {detail}")]
    ImageLoad { path: String, detail: String },

    #[error("image processing failed: {0}")]
    Image(String),

    // -- Output errors --
    #[error("render failed: {0}")]
    Render(String),

    #[error("document packaging failed: {0}")]
    Document(String),

    // -- Backend errors --
    #[error("{service} backend error: {detail}")]
    Backend { service: String, detail: String },

    #[error("{service} backend returned HTTP {status}: {body}")]
    BackendStatus {
        service: String,
        status: u16,
        body: String,
    },

    #[error("{0} timed out")]
    Timeout(String),

    // -- Configuration --
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("no provider registered for {0}")]
    NoProvider(String),

    // -- Storage / serialization --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ReslideError {
    /// Shorthand for a [`ReslideError::Backend`] error.
    pub fn backend(service: impl Into<String>, detail: impl std::fmt::Display) -> Self {
        Self::Backend {
            service: service.into(),
            detail: detail.to_string(),
        }
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ReslideError>;
