use std::io;

use thiserror::Error;

use crate::domain::error::DomainError;

/// Structured errors surfaced by the rendering pipeline. These end up as the
/// error text of a failed job.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error(transparent)]
    Content(#[from] DomainError),
    #[error("rasterizer invocation failed (exit {exit_code:?}): {stderr}")]
    Rasterizer {
        exit_code: Option<i32>,
        stderr: String,
    },
    #[error("rasterizer unavailable: {0}")]
    RasterizerNotFound(io::Error),
    #[error("raster post-processing failed: {message}")]
    Image { message: String },
    #[error("render i/o failed: {0}")]
    Io(#[from] io::Error),
    #[error("render task aborted: {message}")]
    Aborted { message: String },
}

impl RenderError {
    pub fn image(message: impl Into<String>) -> Self {
        Self::Image {
            message: message.into(),
        }
    }
}

/// Output formats produced by a [`Rasterizer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RasterFormat {
    Png,
    Pdf,
}

impl RasterFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            RasterFormat::Png => "png",
            RasterFormat::Pdf => "pdf",
        }
    }
}

/// Opaque backend turning composed SVG pages into raster or PDF bytes.
///
/// PNG output uses the first page only; PDF output appends every page in
/// order. Implementations run on blocking threads.
pub trait Rasterizer: Send + Sync {
    fn rasterize(&self, pages: &[String], format: RasterFormat) -> Result<Vec<u8>, RenderError>;
}
