//! Image probe trait and shared types.
//!
//! The page preprocessor only needs one fact about an image: how wide it is
//! in pixels. [`ImageProbe`] answers that; the production implementation is
//! [`RasterProbe`](super::rust_backend::RasterProbe).

use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Probe failed: {0}")]
    ProbeFailed(String),
}

/// Result of an identify operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Extensions that scale without loss and are never measured.
pub const VECTOR_EXTENSIONS: &[&str] = &["svg", "pdf"];

pub fn is_vector(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| VECTOR_EXTENSIONS.iter().any(|v| e.eq_ignore_ascii_case(v)))
}

/// Measures images referenced from Markdown.
pub trait ImageProbe: Sync {
    /// Get image dimensions.
    fn identify(&self, path: &Path) -> Result<Dimensions, ProbeError>;

    /// Width in pixels, or 0 for vector images, missing files and anything
    /// that fails to decode.
    fn width_px(&self, path: &Path) -> u32 {
        if is_vector(path) {
            debug!(path = %path.display(), "skipping size probe for vector image");
            return 0;
        }
        if !path.exists() {
            debug!(path = %path.display(), "image not found, width 0");
            return 0;
        }
        match self.identify(path) {
            Ok(dims) => dims.width,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "could not read image size");
                0
            }
        }
    }
}
