//! Model-backed reference extraction.
//!
//! Turns a document's full text into a list of structured bibliographic
//! entries by prompting a language model for strict JSON. Long documents
//! are split into chunks that respect the model's output budget; malformed
//! model output is repaired by a fixed recovery ladder before the call is
//! reported as failed.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

pub mod backend;
pub mod chunk;
pub mod mock;
pub mod parse;

pub use backend::{ModelBackend, OpenAiBackend};

/// Character budget per model call. Text longer than this is chunked.
pub const CHUNK_BUDGET: usize = 15_000;

/// How far (in characters) from the ideal split point we will move to
/// land on a paragraph boundary.
pub const BOUNDARY_SLACK: usize = 500;

#[derive(Error, Debug, Clone)]
pub enum LlmError {
    #[error("HTTP request error: {0}")]
    Http(String),
    #[error("model backend error: {0}")]
    Backend(String),
    #[error("unrecoverable model output: {0}")]
    Parse(String),
}

/// One bibliographic entry as produced by the model, after key
/// normalization and post-filtering. All fields are plain strings; missing
/// optional fields are empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedReference {
    pub citation_key: String,
    pub first_author: String,
    pub other_authors: String,
    pub title: String,
    pub year: String,
    pub publisher_journal: String,
    pub volume_issue: String,
    pub pages: String,
    pub extra_notes: String,
    pub isbn: String,
    pub reference_raw: String,
}

/// Extracts references from document text via a [`ModelBackend`].
pub struct ReferenceExtractor {
    backend: Arc<dyn ModelBackend>,
    client: reqwest::Client,
    chunk_budget: usize,
    timeout: Duration,
}

impl ReferenceExtractor {
    pub fn new(backend: Arc<dyn ModelBackend>, client: reqwest::Client) -> Self {
        Self {
            backend,
            client,
            chunk_budget: CHUNK_BUDGET,
            timeout: Duration::from_secs(120),
        }
    }

    /// Override the chunk budget (tests use a small one).
    pub fn with_chunk_budget(mut self, budget: usize) -> Self {
        self.chunk_budget = budget;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Extract all references from `text`.
    ///
    /// Text within the chunk budget results in exactly one model call.
    /// Longer text is split at paragraph boundaries near the budget and
    /// each chunk is extracted independently; results are concatenated and
    /// deduplicated by case-insensitive citation key, first occurrence
    /// winning.
    pub async fn extract(&self, text: &str) -> Result<Vec<ExtractedReference>, LlmError> {
        let chunks = chunk::split_text(text, self.chunk_budget, BOUNDARY_SLACK);
        let total = chunks.len();

        let mut all: Vec<ExtractedReference> = Vec::new();
        for (i, piece) in chunks.iter().enumerate() {
            if total > 1 {
                tracing::debug!(chunk = i + 1, total, len = piece.len(), "extracting chunk");
            }
            let prompt = build_prompt(piece);
            let raw = self
                .backend
                .complete(&prompt, &self.client, self.timeout)
                .await?;
            let entries = parse::parse_references(&raw).map_err(LlmError::Parse)?;
            all.extend(entries);
        }

        Ok(dedup_by_citation_key(all))
    }
}

/// Drop repeated citation keys (case-insensitive), keeping the first.
fn dedup_by_citation_key(entries: Vec<ExtractedReference>) -> Vec<ExtractedReference> {
    let mut seen = std::collections::HashSet::new();
    entries
        .into_iter()
        .filter(|e| seen.insert(e.citation_key.to_lowercase()))
        .collect()
}

/// Prompt asking the model for strict JSON with the canonical field names.
fn build_prompt(text: &str) -> String {
    format!(
        "Extract every bibliographic reference from the following document text. \
         Respond with ONLY a JSON array, no prose and no markdown. Each element must \
         be an object with the keys: citationKey, firstAuthor, otherAuthors (semicolon \
         separated), title, year, publisherJournal, volumeIssue, pages, extraNotes, \
         isbn, referenceRaw (the original reference text). Use an empty string for \
         anything not present in the text.\n\nDocument text:\n{text}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockModel;

    fn entry(key: &str) -> String {
        format!(r#"{{"citationKey":"{key}","title":"T","firstAuthor":"A"}}"#)
    }

    #[tokio::test]
    async fn small_text_is_one_call() {
        let model = Arc::new(MockModel::always(format!("[{}]", entry("K1"))));
        let extractor = ReferenceExtractor::new(model.clone(), reqwest::Client::new());

        let refs = extractor.extract("short document").await.unwrap();
        assert_eq!(refs.len(), 1);
        assert_eq!(model.call_count(), 1);
    }

    #[tokio::test]
    async fn long_text_is_one_call_per_chunk() {
        let model = Arc::new(MockModel::with_sequence(vec![
            Ok(format!("[{}]", entry("K1"))),
            Ok(format!("[{},{}]", entry("k1"), entry("K2"))),
        ]));
        let extractor = ReferenceExtractor::new(model.clone(), reqwest::Client::new())
            .with_chunk_budget(100);

        let text = "x".repeat(150);
        let refs = extractor.extract(&text).await.unwrap();

        assert_eq!(model.call_count(), 2);
        // "k1" from the second chunk is a case-insensitive repeat of "K1"
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].citation_key, "K1");
        assert_eq!(refs[1].citation_key, "K2");
    }

    #[tokio::test]
    async fn backend_error_propagates() {
        let model = Arc::new(MockModel::with_sequence(vec![Err(LlmError::Backend(
            "boom".into(),
        ))]));
        let extractor = ReferenceExtractor::new(model, reqwest::Client::new());
        assert!(extractor.extract("text").await.is_err());
    }

    #[test]
    fn dedup_is_case_insensitive_first_wins() {
        let mut a = ExtractedReference::default();
        a.citation_key = "Smith'99".into();
        a.title = "first".into();
        let mut b = ExtractedReference::default();
        b.citation_key = "SMITH'99".into();
        b.title = "second".into();

        let out = dedup_by_citation_key(vec![a, b]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].title, "first");
    }
}
