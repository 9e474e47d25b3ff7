//! Grid and scalebar preview handlers

use axum::Json;
use axum::extract::{Query, State};
use axum::response::IntoResponse;

use crate::domain::geo::{BBox, PageSize, Viewport};
use crate::domain::grid::{Grid, GridCells, GridStyle};
use crate::domain::scalebar::Scalebar;

use crate::infra::http::api::error::ApiError;
use crate::infra::http::api::models::{GridQuery, ScalebarQuery, ScalebarResponse};
use crate::infra::http::api::state::ApiState;

pub async fn grid(
    State(state): State<ApiState>,
    Query(query): Query<GridQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let bbox = BBox::parse(&query.bbox)?;
    let cells = match query.cells.as_deref() {
        Some(cells) => cells.parse::<GridCells>()?,
        None => GridCells::for_bbox(&bbox),
    };
    let style = match query.style.as_deref() {
        Some(style) => style.parse::<GridStyle>()?,
        None => state.grid_style,
    };

    Ok(Json(Grid::generate(bbox, cells, style).to_feature_collection()))
}

pub async fn scalebar(Query(query): Query<ScalebarQuery>) -> Result<impl IntoResponse, ApiError> {
    let bbox = BBox::parse(&query.bbox)?;
    let scalebar = match query.width {
        Some(width) if width.is_finite() && width > 0.0 => Scalebar::for_bbox(&bbox, width),
        Some(_) => {
            return Err(ApiError::bad_request(
                "width must be a positive number",
                None,
            ));
        }
        None => Scalebar::for_viewport(&bbox, &Viewport::fit(&bbox, PageSize::for_bbox(&bbox))),
    };

    Ok(Json(ScalebarResponse::from(&scalebar)))
}
