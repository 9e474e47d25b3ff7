use std::{io::Cursor, sync::Arc, time::Instant};

use image::{ImageFormat, imageops::FilterType};
use tracing::info;

use crate::domain::{
    content::MapContent,
    geo::{PageSize, Viewport},
    grid::{Grid, GridCells, GridStyle},
    scalebar::Scalebar,
    types::FileFormat,
};

use super::{
    background::{BackgroundImage, BackgroundSource},
    svg::{MapPage, description_page},
    types::{RasterFormat, RenderError, Rasterizer},
};

/// Turns a validated content document into artifact bytes.
pub struct RenderPipeline {
    background: BackgroundSource,
    rasterizer: Arc<dyn Rasterizer>,
    grid_style: GridStyle,
}

impl RenderPipeline {
    pub fn new(
        background: BackgroundSource,
        rasterizer: Arc<dyn Rasterizer>,
        grid_style: GridStyle,
    ) -> Self {
        Self {
            background,
            rasterizer,
            grid_style,
        }
    }

    pub fn grid_style(&self) -> GridStyle {
        self.grid_style
    }

    /// Fetch the background, then compose and rasterize on a blocking thread.
    pub async fn render(
        &self,
        content: MapContent,
        format: FileFormat,
    ) -> Result<Vec<u8>, RenderError> {
        let page = PageSize::for_bbox(&content.bbox);
        let background = self
            .background
            .fetch(content.theme.as_deref(), &content.bbox, page)
            .await;

        let rasterizer = Arc::clone(&self.rasterizer);
        let grid_style = self.grid_style;
        tokio::task::spawn_blocking(move || {
            render_document(
                &content,
                format,
                background.as_ref(),
                rasterizer.as_ref(),
                grid_style,
            )
        })
        .await
        .map_err(|err| RenderError::Aborted {
            message: err.to_string(),
        })?
    }
}

/// Synchronous render of one document.
pub fn render_document(
    content: &MapContent,
    format: FileFormat,
    background: Option<&BackgroundImage>,
    rasterizer: &dyn Rasterizer,
    grid_style: GridStyle,
) -> Result<Vec<u8>, RenderError> {
    let started_at = Instant::now();
    let page = PageSize::for_bbox(&content.bbox);
    let viewport = Viewport::fit(&content.bbox, page);

    let generated;
    let grid = match &content.grid {
        Some(grid) => grid,
        None => {
            generated = Grid::generate(content.bbox, GridCells::for_bbox(&content.bbox), grid_style)
                .to_feature_collection();
            &generated
        }
    };
    let scalebar = Scalebar::for_viewport(&content.bbox, &viewport);

    let map_svg = MapPage {
        content,
        grid,
        scalebar: &scalebar,
        viewport,
        background,
    }
    .to_svg();

    let bytes = match format {
        FileFormat::Svg => map_svg.into_bytes(),
        FileFormat::Png(_) => {
            let native = rasterizer.rasterize(&[map_svg], RasterFormat::Png)?;
            scale_png(native, format.scale())?
        }
        FileFormat::Pdf => {
            let mut pages = vec![map_svg];
            if let Some(description) = content.description() {
                pages.push(description_page(description, page));
            }
            rasterizer.rasterize(&pages, RasterFormat::Pdf)?
        }
    };

    info!(
        target = "kartenwerk::render",
        op = "render_document",
        file_type = %format,
        page_width = page.width,
        page_height = page.height,
        background = background.is_some(),
        elapsed_ms = started_at.elapsed().as_millis() as u64,
        output_bytes = bytes.len(),
        "Map document rendered"
    );
    Ok(bytes)
}

/// Resample a native PNG to `floor(native * scale)` with the nearest filter.
pub fn scale_png(bytes: Vec<u8>, scale: f64) -> Result<Vec<u8>, RenderError> {
    if (scale - 1.0).abs() < f64::EPSILON {
        return Ok(bytes);
    }

    let image = image::load_from_memory_with_format(&bytes, ImageFormat::Png)
        .map_err(|err| RenderError::image(err.to_string()))?;
    let width = (f64::from(image.width()) * scale).floor().max(1.0) as u32;
    let height = (f64::from(image.height()) * scale).floor().max(1.0) as u32;
    let resized = image.resize_exact(width, height, FilterType::Nearest);

    let mut out = Cursor::new(Vec::new());
    resized
        .write_to(&mut out, ImageFormat::Png)
        .map_err(|err| RenderError::image(err.to_string()))?;
    Ok(out.into_inner())
}
