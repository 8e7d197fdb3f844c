//! Image collaborators of the page preprocessor.
//!
//! | Concern | Implementation |
//! |---|---|
//! | **Width probe** | [`ImageProbe`] trait, [`RasterProbe`] via `image::image_dimensions` |
//! | **SVG → PDF** | [`SvgConverter`] adapters (`rsvg-convert`, `inkscape`) |
//!
//! The module is split into:
//! - **Backend**: [`ImageProbe`] trait and shared types
//! - **Rust backend**: [`RasterProbe`], header-only decoding
//! - **SVG**: converter adapters and [`ensure_svg_pdf`]

pub mod backend;
pub mod rust_backend;
pub mod svg;

pub use backend::{Dimensions, ImageProbe, ProbeError, is_vector};
pub use rust_backend::RasterProbe;
pub use svg::{CommandConverter, ConvertError, SvgConverter, SvgOutcome, default_converters, ensure_svg_pdf};
