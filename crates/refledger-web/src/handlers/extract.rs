use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;

use refledger_core::CoreError;

use crate::models::{JobCreated, SubmitRequest, error_json};
use crate::state::AppState;

/// `POST /api/extract` — submit document text, get a job id back.
pub async fn submit(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SubmitRequest>,
) -> impl IntoResponse {
    match state.extraction.submit_text(req.text) {
        Ok(job_id) => (StatusCode::ACCEPTED, Json(JobCreated { job_id })).into_response(),
        Err(CoreError::InvalidInput(msg)) => {
            (StatusCode::BAD_REQUEST, Json(error_json(msg))).into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "extraction submit failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(error_json(e.to_string())),
            )
                .into_response()
        }
    }
}

/// `GET /api/extract/{job_id}` — poll one job.
pub async fn status(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> impl IntoResponse {
    match state.registry.get_extraction(&job_id) {
        Some(job) => {
            let mut body = serde_json::to_value(&job).unwrap_or_default();
            body["step"] = serde_json::Value::from(job.step());
            Json(body).into_response()
        }
        None => (
            StatusCode::NOT_FOUND,
            Json(error_json(format!("no such job: {job_id}"))),
        )
            .into_response(),
    }
}

/// `GET /api/extract` — all known jobs, newest first.
pub async fn list(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.registry.list_extraction() {
        Ok(jobs) => Json(jobs).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "listing jobs failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(error_json(e.to_string())),
            )
                .into_response()
        }
    }
}

/// `DELETE /api/extract/{job_id}` — forget a job.
pub async fn delete(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> impl IntoResponse {
    match state.registry.delete_extraction(&job_id) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(error_json(e.to_string())),
        )
            .into_response(),
    }
}
