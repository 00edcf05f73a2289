use axum::{Router, routing::{get, post}};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::AppState;

mod jobs;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/jobs", post(jobs::submit))
        .route("/jobs/{job_id}", get(jobs::get_job))
        .route("/invoke", post(jobs::invoke))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
