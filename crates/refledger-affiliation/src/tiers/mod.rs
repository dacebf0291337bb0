//! Lookup tier trait and implementations for the external sources.

pub mod ai_search;
pub mod openalex;
pub mod semantic_scholar;

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use crate::ResolveConfidence;
use crate::rate_limit::TierLimiter;

/// What a tier is asked to resolve.
#[derive(Debug, Clone)]
pub struct LookupQuery {
    pub author: String,
    pub title: String,
    /// Parsed publication year, if the record had a usable one.
    pub year: Option<i32>,
}

/// One ranked external source in the affiliation resolution chain.
///
/// `Ok(None)` is a miss; `Err` is a transport/service failure. Both cause
/// the resolver to fall through to the next tier.
pub trait LookupTier: Send + Sync {
    /// The canonical name of this tier (e.g., "semantic-scholar").
    fn name(&self) -> &str;

    /// Confidence assigned to an affiliation this tier produces.
    fn confidence(&self) -> ResolveConfidence;

    /// `limiter` paces this tier's traffic. A tier that issues more than
    /// one HTTP request per lookup must wait on it before every request,
    /// not just the first.
    fn lookup<'a>(
        &'a self,
        query: &'a LookupQuery,
        client: &'a reqwest::Client,
        timeout: Duration,
        limiter: Option<&'a TierLimiter>,
    ) -> Pin<Box<dyn Future<Output = Result<Option<String>, String>> + Send + 'a>>;
}
