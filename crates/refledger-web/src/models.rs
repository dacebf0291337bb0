use serde::{Deserialize, Serialize};

// ── Request DTOs ────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct SubmitRequest {
    /// Full extracted text of the document.
    pub text: String,
}

// ── Response DTOs ───────────────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobCreated {
    pub job_id: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub total: usize,
    pub notes_mention_institution: usize,
    pub notes_empty: usize,
}

#[derive(Serialize)]
pub struct ClearedResponse {
    pub cleared: bool,
}

pub fn error_json(message: impl Into<String>) -> serde_json::Value {
    serde_json::json!({ "error": message.into() })
}
