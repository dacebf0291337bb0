//! Mock lookup tier for testing.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::ResolveConfidence;
use crate::rate_limit::TierLimiter;
use crate::tiers::{LookupQuery, LookupTier};

/// A scripted [`LookupTier`] that records the order tiers are consulted in.
pub struct MockTier {
    name: &'static str,
    confidence: ResolveConfidence,
    response: Result<Option<String>, String>,
    call_count: AtomicUsize,
    limiter_seen: AtomicBool,
    /// Shared across tiers so a test can assert consultation order.
    call_log: Arc<Mutex<Vec<&'static str>>>,
}

impl MockTier {
    pub fn new(
        name: &'static str,
        response: Result<Option<String>, String>,
        call_log: Arc<Mutex<Vec<&'static str>>>,
    ) -> Self {
        Self {
            name,
            confidence: ResolveConfidence::Medium,
            response,
            call_count: AtomicUsize::new(0),
            limiter_seen: AtomicBool::new(false),
            call_log,
        }
    }

    pub fn with_confidence(mut self, confidence: ResolveConfidence) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Whether the resolver handed this tier a limiter on any lookup.
    pub fn limiter_seen(&self) -> bool {
        self.limiter_seen.load(Ordering::SeqCst)
    }
}

impl LookupTier for MockTier {
    fn name(&self) -> &str {
        self.name
    }

    fn confidence(&self) -> ResolveConfidence {
        self.confidence
    }

    fn lookup<'a>(
        &'a self,
        _query: &'a LookupQuery,
        _client: &'a reqwest::Client,
        _timeout: Duration,
        limiter: Option<&'a TierLimiter>,
    ) -> Pin<Box<dyn Future<Output = Result<Option<String>, String>> + Send + 'a>> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        self.call_log.lock().unwrap().push(self.name);
        let response = self.response.clone();
        Box::pin(async move {
            if let Some(l) = limiter {
                self.limiter_seen.store(true, Ordering::SeqCst);
                l.acquire().await;
            }
            response
        })
    }
}
