//! Tier 3: the OpenAlex works index.
//!
//! Queries works by title (optionally filtered by publication year), takes
//! the top result, and scans its authorship/institution pairs for a name
//! match. An affiliation is only accepted when the name match succeeds —
//! a differently-authored top hit is a miss, never a result.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use super::{LookupQuery, LookupTier};
use crate::names::authors_match;
use crate::rate_limit::TierLimiter;
use crate::{ResolveConfidence, query_words};

pub struct OpenAlex {
    /// Contact address for OpenAlex's polite pool.
    pub mailto: Option<String>,
}

/// Filter clause for the works endpoint. The title goes in as bare
/// search words: commas separate filter clauses in OpenAlex's grammar,
/// so punctuation from the title must never reach the filter string.
fn works_filter(query: &LookupQuery) -> String {
    let words = query_words(&query.title, 8).join(" ");
    let mut filter = format!("title.search:{words}");
    if let Some(year) = query.year {
        filter.push_str(&format!(",publication_year:{year}"));
    }
    filter
}

impl LookupTier for OpenAlex {
    fn name(&self) -> &str {
        "openalex"
    }

    fn confidence(&self) -> ResolveConfidence {
        ResolveConfidence::Low
    }

    fn lookup<'a>(
        &'a self,
        query: &'a LookupQuery,
        client: &'a reqwest::Client,
        timeout: Duration,
        limiter: Option<&'a TierLimiter>,
    ) -> Pin<Box<dyn Future<Output = Result<Option<String>, String>> + Send + 'a>> {
        Box::pin(async move {
            let filter = works_filter(query);
            let mut url = format!(
                "https://api.openalex.org/works?filter={}&per-page=1",
                urlencoding::encode(&filter)
            );
            if let Some(ref mailto) = self.mailto {
                url.push_str(&format!("&mailto={}", urlencoding::encode(mailto)));
            }

            if let Some(l) = limiter {
                l.acquire().await;
            }
            let resp = client
                .get(&url)
                .header("User-Agent", "refledger")
                .timeout(timeout)
                .send()
                .await
                .map_err(|e| e.to_string())?;
            let status = resp.status();
            if !status.is_success() {
                return Err(format!("HTTP {status}"));
            }

            let data: serde_json::Value = resp.json().await.map_err(|e| e.to_string())?;
            let Some(top) = data["results"].as_array().and_then(|r| r.first()) else {
                return Ok(None);
            };

            let authorships = top["authorships"].as_array().cloned().unwrap_or_default();
            for authorship in &authorships {
                let name = authorship["author"]["display_name"].as_str().unwrap_or("");
                if name.is_empty() || !authors_match(&query.author, name) {
                    continue;
                }
                let affiliation = authorship["institutions"]
                    .as_array()
                    .and_then(|insts| insts.first())
                    .and_then(|i| i["display_name"].as_str())
                    .filter(|s| !s.is_empty())
                    .map(String::from);
                if affiliation.is_some() {
                    return Ok(affiliation);
                }
            }

            Ok(None)
        })
    }
}
