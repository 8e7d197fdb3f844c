//! Pure Rust image probe.
//!
//! | Format | Crate / function |
//! |---|---|
//! | JPEG, PNG, TIFF, WebP, GIF | `image::image_dimensions` (header only) |
//! | SVG, PDF | not measured, see [`is_vector`](super::backend::is_vector) |

use super::backend::{Dimensions, ImageProbe, ProbeError};
use std::path::Path;

/// Reads raster dimensions from the file header via the `image` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct RasterProbe;

impl ImageProbe for RasterProbe {
    fn identify(&self, path: &Path) -> Result<Dimensions, ProbeError> {
        let (width, height) = image::image_dimensions(path)
            .map_err(|e| ProbeError::ProbeFailed(format!("Failed to read dimensions: {}", e)))?;
        Ok(Dimensions { width, height })
    }
}
