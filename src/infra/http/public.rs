use std::sync::Arc;

use axum::{
    Json, Router,
    body::Body,
    extract::{Path, Query, State},
    http::{
        HeaderValue, StatusCode,
        header::{CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE},
    },
    middleware,
    response::{IntoResponse, Response},
    routing::get,
};
use bytes::Bytes;
use serde::Deserialize;
use tracing::{error, info};

use crate::{
    application::{error::HttpError, jobs::RenderRequest, repos::ArtifactRepo},
    domain::{
        artifact::{LATEST, VersionSelector, parse_artifact_name, validate_version},
        jobs::validate_map_id,
        types::FileFormat,
    },
};

use super::{
    RouterState,
    api::{error::ApiError, models::submit_outcome_to_api, state::ApiState},
    middleware::{log_responses, set_request_context},
};

#[derive(Clone)]
pub struct HttpState {
    pub artifacts: Arc<dyn ArtifactRepo>,
}

pub fn build_router(state: RouterState) -> Router<RouterState> {
    Router::new()
        .route("/health", get(health))
        .route("/artifacts/{dir}/{name}", get(serve_artifact))
        .route("/maps/{map_id}/download/{file_type}", get(download_map))
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DownloadQuery {
    version: Option<String>,
}

async fn health() -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn serve_artifact(
    State(state): State<HttpState>,
    Path((dir, name)): Path<(String, String)>,
) -> Response {
    const SOURCE: &str = "infra::http::public::serve_artifact";

    let Some((selector, format)) = parse_artifact_name(&name) else {
        return artifact_not_found(SOURCE);
    };

    match state.artifacts.read_path(&dir, &name).await {
        Ok(Some(bytes)) => build_artifact_response(format, &selector, bytes),
        Ok(None) => artifact_not_found(SOURCE),
        Err(err) => artifact_read_failed(SOURCE, &format!("{dir}/{name}"), &err),
    }
}

/// Without `version` the map's current document decides which artifact is
/// served; a missing artifact is queued for rendering and answered with the
/// job status. `version=LATEST` serves the alias of the newest render.
async fn download_map(
    State(state): State<HttpState>,
    State(api): State<ApiState>,
    Path((map_id, file_type)): Path<(String, String)>,
    Query(query): Query<DownloadQuery>,
) -> Response {
    const SOURCE: &str = "infra::http::public::download_map";

    if let Err(err) = validate_map_id(&map_id) {
        return HttpError::from_error(SOURCE, StatusCode::BAD_REQUEST, "Invalid map id", &err)
            .into_response();
    }
    let format: FileFormat = match file_type.parse() {
        Ok(format) => format,
        Err(err) => {
            return HttpError::from_error(
                SOURCE,
                StatusCode::BAD_REQUEST,
                "Unsupported file type",
                &err,
            )
            .into_response();
        }
    };

    let selector = match query.version {
        Some(version) if version == LATEST => VersionSelector::Latest,
        Some(version) => {
            if validate_version(&version).is_err() {
                return artifact_not_found(SOURCE);
            }
            VersionSelector::Exact(version)
        }
        None => return download_current(&state, &api, map_id, format).await,
    };

    match state.artifacts.read(&map_id, &selector, format).await {
        Ok(Some(bytes)) => build_artifact_response(format, &selector, bytes),
        Ok(None) => artifact_not_found(SOURCE),
        Err(err) => artifact_read_failed(SOURCE, &map_id, &err),
    }
}

async fn download_current(
    state: &HttpState,
    api: &ApiState,
    map_id: String,
    format: FileFormat,
) -> Response {
    const SOURCE: &str = "infra::http::public::download_current";

    let content = match api.maps.load(&map_id).await {
        Ok(Some(content)) => content,
        Ok(None) => return ApiError::not_found("map not found").into_response(),
        Err(err) => return ApiError::from(err).into_response(),
    };
    let version = match api.broker.prepare(content.clone()) {
        Ok(prepared) => prepared.version,
        Err(err) => return ApiError::from(err).into_response(),
    };

    let selector = VersionSelector::Exact(version);
    match state.artifacts.read(&map_id, &selector, format).await {
        Ok(Some(bytes)) => return build_artifact_response(format, &selector, bytes),
        Ok(None) => {}
        Err(err) => return artifact_read_failed(SOURCE, &map_id, &err),
    }

    let request = RenderRequest {
        map_id,
        content,
        format,
        force: false,
    };
    match api.broker.submit(request).await {
        Ok(outcome) => {
            info!(
                target = "kartenwerk::http",
                map_id = %outcome.job.key.map_id,
                version = %outcome.job.key.version,
                file_type = %format,
                "Download missed; render submitted"
            );
            let status = if outcome.already_satisfied {
                StatusCode::OK
            } else {
                StatusCode::ACCEPTED
            };
            (status, Json(submit_outcome_to_api(outcome, &api.public_url))).into_response()
        }
        Err(err) => ApiError::from(err).into_response(),
    }
}

fn artifact_not_found(source: &'static str) -> Response {
    HttpError::new(
        source,
        StatusCode::NOT_FOUND,
        "Artifact not found",
        "The requested artifact is not available",
    )
    .into_response()
}

fn artifact_read_failed(
    source: &'static str,
    path: &str,
    err: &crate::application::repos::RepoError,
) -> Response {
    error!(
        target = "kartenwerk::store",
        path = %path,
        error = %err,
        "failed to read stored artifact"
    );
    HttpError::from_error(
        source,
        StatusCode::INTERNAL_SERVER_ERROR,
        "Failed to read artifact",
        err,
    )
    .into_response()
}

/// Versioned artifacts never change; the `LATEST` alias must be revalidated.
fn build_artifact_response(
    format: FileFormat,
    selector: &VersionSelector,
    bytes: Bytes,
) -> Response {
    let length = bytes.len();
    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = StatusCode::OK;

    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(format.mimetype()));
    if let Ok(value) = HeaderValue::from_str(&length.to_string()) {
        headers.insert(CONTENT_LENGTH, value);
    }
    let cache_control = match selector {
        VersionSelector::Exact(_) => "public, max-age=31536000, immutable",
        VersionSelector::Latest => "no-cache",
    };
    headers.insert(CACHE_CONTROL, HeaderValue::from_static(cache_control));

    response
}
