//! Tier 1: the Semantic Scholar academic graph.
//!
//! Searches for the paper by title, then — once a candidate in the right
//! year range carries a matching author — fetches that author's profile
//! and takes the most recent listed affiliation.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use super::{LookupQuery, LookupTier};
use crate::names::find_matching_author;
use crate::rate_limit::TierLimiter;
use crate::titles::titles_match;
use crate::{ResolveConfidence, query_words};

pub struct SemanticScholar {
    pub api_key: Option<String>,
}

impl SemanticScholar {
    fn request(&self, client: &reqwest::Client, url: &str, timeout: Duration) -> reqwest::RequestBuilder {
        let mut req = client
            .get(url)
            .header("User-Agent", "refledger")
            .timeout(timeout);
        if let Some(ref key) = self.api_key {
            req = req.header("x-api-key", key);
        }
        req
    }
}

impl LookupTier for SemanticScholar {
    fn name(&self) -> &str {
        "semantic-scholar"
    }

    fn confidence(&self) -> ResolveConfidence {
        ResolveConfidence::High
    }

    fn lookup<'a>(
        &'a self,
        query: &'a LookupQuery,
        client: &'a reqwest::Client,
        timeout: Duration,
        limiter: Option<&'a TierLimiter>,
    ) -> Pin<Box<dyn Future<Output = Result<Option<String>, String>> + Send + 'a>> {
        Box::pin(async move {
            let words = query_words(&query.title, 8).join(" ");
            let url = format!(
                "https://api.semanticscholar.org/graph/v1/paper/search?query={}&limit=10&fields=title,year,authors",
                urlencoding::encode(&words)
            );

            if let Some(l) = limiter {
                l.acquire().await;
            }
            let resp = self
                .request(client, &url, timeout)
                .send()
                .await
                .map_err(|e| e.to_string())?;
            let status = resp.status();
            if !status.is_success() {
                return Err(format!("HTTP {status}"));
            }

            let data: serde_json::Value = resp.json().await.map_err(|e| e.to_string())?;
            let results = data["data"].as_array().cloned().unwrap_or_default();

            for item in &results {
                if let (Some(target), Some(found)) = (query.year, item["year"].as_i64()) {
                    if (found as i32 - target).abs() > 1 {
                        continue;
                    }
                }
                let found_title = item["title"].as_str().unwrap_or("");
                if found_title.is_empty() || !titles_match(&query.title, found_title) {
                    continue;
                }

                let authors = item["authors"].as_array().cloned().unwrap_or_default();
                let names: Vec<&str> = authors
                    .iter()
                    .filter_map(|a| a["name"].as_str())
                    .collect();
                let Some(idx) = find_matching_author(&query.author, names.iter().copied()) else {
                    continue;
                };
                let Some(author_id) = authors[idx]["authorId"].as_str() else {
                    continue;
                };

                return self
                    .author_affiliation(author_id, client, timeout, limiter)
                    .await;
            }

            Ok(None)
        })
    }
}

impl SemanticScholar {
    /// Second lookup: the matched author's profile. Waits for its own
    /// permit so a hit does not burst two requests in one period.
    async fn author_affiliation(
        &self,
        author_id: &str,
        client: &reqwest::Client,
        timeout: Duration,
        limiter: Option<&TierLimiter>,
    ) -> Result<Option<String>, String> {
        let url = format!(
            "https://api.semanticscholar.org/graph/v1/author/{}?fields=name,affiliations",
            urlencoding::encode(author_id)
        );
        if let Some(l) = limiter {
            l.acquire().await;
        }
        let resp = self
            .request(client, &url, timeout)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        let status = resp.status();
        if !status.is_success() {
            return Err(format!("HTTP {status}"));
        }

        let data: serde_json::Value = resp.json().await.map_err(|e| e.to_string())?;
        // The profile lists affiliations most-recent first.
        let affiliation = data["affiliations"]
            .as_array()
            .and_then(|arr| arr.iter().filter_map(|v| v.as_str()).find(|s| !s.is_empty()))
            .map(String::from);

        Ok(affiliation)
    }
}
