use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;

use crate::models::{JobCreated, error_json};
use crate::state::AppState;

/// `POST /api/enhance` — start an affiliation-enhancement run over every
/// record that still lacks one.
pub async fn start(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let job_id = state.enhancement.start();
    (StatusCode::ACCEPTED, Json(JobCreated { job_id }))
}

/// `GET /api/enhance/{job_id}` — poll one run.
pub async fn status(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> impl IntoResponse {
    match state.registry.get_enhancement(&job_id) {
        Some(job) => Json(job).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(error_json(format!("no such job: {job_id}"))),
        )
            .into_response(),
    }
}
