pub mod error;
pub mod handlers;
pub mod models;
pub mod state;

pub use state::ApiState;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};

use crate::infra::http::RouterState;
use crate::infra::http::middleware::{log_responses, set_request_context};

pub fn build_api_router(state: RouterState) -> Router<RouterState> {
    Router::new()
        .route("/api/maps/{map_id}/render", post(handlers::submit_render))
        .route(
            "/api/maps/{map_id}/status/{version}/{file_type}",
            get(handlers::tuple_status),
        )
        .route("/api/jobs/{job_id}", get(handlers::job_status))
        .route("/api/grid", get(handlers::grid))
        .route("/api/scalebar", get(handlers::scalebar))
        .with_state(state)
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
}
