//! Map rendering: SVG composition, background fetch and rasterization.
//!
//! Composition is pure and deterministic; the rasterizer is an opaque
//! backend behind the [`Rasterizer`] trait.

mod background;
mod layers;
mod rasterizer;
mod service;
mod svg;
mod types;

pub use background::{BackgroundError, BackgroundImage, BackgroundSource, OFFLINE_THEME};
pub use layers::{FeatureStyle, draw_order, sanitize_color};
pub use rasterizer::CliRasterizer;
pub use service::{RenderPipeline, render_document, scale_png};
pub use svg::{ATTRIBUTION, MapPage, description_page};
pub use types::{RasterFormat, RenderError, Rasterizer};
