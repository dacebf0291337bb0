use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;

use crate::models::{ClearedResponse, StatsResponse, error_json};
use crate::state::AppState;

/// `GET /api/records` — the full master table.
pub async fn list(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.store.load() {
        Ok(records) => Json(records).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "loading records failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(error_json(e.to_string())),
            )
                .into_response()
        }
    }
}

/// `DELETE /api/records` — clear the master table.
pub async fn clear(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.store.clear() {
        Ok(()) => Json(ClearedResponse { cleared: true }).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(error_json(e.to_string())),
        )
            .into_response(),
    }
}

/// `GET /api/records/stats` — coarse counters over the table.
pub async fn stats(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.store.stats() {
        Ok(stats) => Json(StatsResponse {
            total: stats.total,
            notes_mention_institution: stats.notes_mention_institution,
            notes_empty: stats.notes_empty,
        })
        .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(error_json(e.to_string())),
        )
            .into_response(),
    }
}
