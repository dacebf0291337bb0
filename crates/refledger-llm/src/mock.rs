//! Mock model backend for testing.

use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::LlmError;
use crate::backend::ModelBackend;

/// A scripted [`ModelBackend`] for tests.
///
/// Returns responses in sequence, repeating the last one when exhausted.
/// Counts calls via [`call_count()`](MockModel::call_count).
pub struct MockModel {
    /// Reversed so the next response can be popped from the back.
    responses: Mutex<Vec<Result<String, LlmError>>>,
    fallback: Result<String, LlmError>,
    call_count: AtomicUsize,
}

impl MockModel {
    /// A mock that always returns `response`.
    pub fn always(response: String) -> Self {
        Self {
            responses: Mutex::new(Vec::new()),
            fallback: Ok(response),
            call_count: AtomicUsize::new(0),
        }
    }

    /// A mock that returns `responses` in order, repeating the last.
    pub fn with_sequence(mut responses: Vec<Result<String, LlmError>>) -> Self {
        assert!(!responses.is_empty(), "sequence must not be empty");
        responses.reverse();
        let fallback = responses.first().cloned().unwrap();
        Self {
            responses: Mutex::new(responses),
            fallback,
            call_count: AtomicUsize::new(0),
        }
    }

    /// How many times `complete()` has been called.
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    fn next_response(&self) -> Result<String, LlmError> {
        let mut seq = self.responses.lock().unwrap();
        seq.pop().unwrap_or_else(|| self.fallback.clone())
    }
}

impl ModelBackend for MockModel {
    fn name(&self) -> &str {
        "mock"
    }

    fn complete<'a>(
        &'a self,
        _prompt: &'a str,
        _client: &'a reqwest::Client,
        _timeout: Duration,
    ) -> Pin<Box<dyn Future<Output = Result<String, LlmError>> + Send + 'a>> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        let response = self.next_response();
        Box::pin(async move { response })
    }
}
