//! Render submission and job status handlers

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use bytes::Bytes;
use kartenwerk_api_types::JobStatusResponse;
use serde_json::Value;
use url::Url;
use uuid::Uuid;

use crate::application::jobs::{JobView, RenderRequest};
use crate::domain::jobs::{JobKey, validate_map_id};

use super::parse_file_type;
use crate::infra::http::api::error::ApiError;
use crate::infra::http::api::models::{RenderQuery, job_view_to_api, submit_outcome_to_api};
use crate::infra::http::api::state::ApiState;

const DEFAULT_FILE_TYPE: &str = "png";

pub async fn submit_render(
    State(state): State<ApiState>,
    Path(map_id): Path<String>,
    Query(query): Query<RenderQuery>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    validate_map_id(&map_id)?;
    let format = parse_file_type(query.file_type.as_deref().unwrap_or(DEFAULT_FILE_TYPE))?;

    let content = if body.iter().all(u8::is_ascii_whitespace) {
        state
            .maps
            .load(&map_id)
            .await?
            .ok_or_else(|| ApiError::not_found("map not found"))?
    } else {
        serde_json::from_slice::<Value>(&body).map_err(|err| {
            ApiError::bad_request("request body is not valid JSON", Some(err.to_string()))
        })?
    };

    let outcome = state
        .broker
        .submit(RenderRequest {
            map_id,
            content,
            format,
            force: query.force,
        })
        .await?;

    let status = if outcome.already_satisfied {
        StatusCode::OK
    } else {
        StatusCode::ACCEPTED
    };
    Ok((status, Json(submit_outcome_to_api(outcome, &state.public_url))))
}

pub async fn job_status(
    State(state): State<ApiState>,
    Path(job_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let job_id = Uuid::parse_str(&job_id).map_err(|_| ApiError::not_found("job not found"))?;
    let view = state.status.by_id(job_id)?;
    Ok(job_status_response(view, &state.public_url))
}

pub async fn tuple_status(
    State(state): State<ApiState>,
    Path((map_id, version, file_type)): Path<(String, String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    validate_map_id(&map_id)?;
    let format = parse_file_type(&file_type)?;
    let view = state
        .status
        .by_key(JobKey::new(map_id, version, format))
        .await?;
    Ok(job_status_response(view, &state.public_url))
}

/// `202` until the job reaches a terminal state.
fn job_status_response(view: JobView, public_url: &Url) -> (StatusCode, Json<JobStatusResponse>) {
    let status = if view.state.is_terminal() {
        StatusCode::OK
    } else {
        StatusCode::ACCEPTED
    };
    (status, Json(job_view_to_api(view, public_url)))
}
