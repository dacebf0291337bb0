//! Tier 2: conversational AI search (Perplexity-compatible API).
//!
//! Only active when an API key is configured. Asks a single zero-temperature
//! question for the author's institution in "Institution (XX)" form and
//! accepts the answer only if it survives shape validation.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::json;

use super::{LookupQuery, LookupTier};
use crate::ResolveConfidence;
use crate::rate_limit::TierLimiter;

/// Accepted answer shape: institution name plus ISO-2 country code.
static INSTITUTION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.{2,}?)\s*\(([A-Z]{2})\)$").expect("valid regex"));

/// `[3]`-style citation markers the search model inserts.
static CITATION_MARKER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[\d+\]").expect("valid regex"));

const REFUSAL_MARKERS: &[&str] = &[
    "unknown",
    "i don't know",
    "i do not know",
    "cannot determine",
    "not publicly available",
    "no information",
];

pub struct AiSearch {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
}

impl AiSearch {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            model: "sonar".into(),
            base_url: "https://api.perplexity.ai".into(),
        }
    }
}

impl LookupTier for AiSearch {
    fn name(&self) -> &str {
        "ai-search"
    }

    fn confidence(&self) -> ResolveConfidence {
        ResolveConfidence::Medium
    }

    fn lookup<'a>(
        &'a self,
        query: &'a LookupQuery,
        client: &'a reqwest::Client,
        timeout: Duration,
        limiter: Option<&'a TierLimiter>,
    ) -> Pin<Box<dyn Future<Output = Result<Option<String>, String>> + Send + 'a>> {
        Box::pin(async move {
            let year_part = query
                .year
                .map(|y| format!(" (published around {y})"))
                .unwrap_or_default();
            let question = format!(
                "What was the institutional affiliation of {} when writing the paper \
                 \"{}\"{}? Answer with only the institution name followed by the \
                 ISO-2 country code in parentheses, for example \"MIT (US)\". \
                 If you do not know, answer \"Unknown\".",
                query.author, query.title, year_part
            );

            let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
            let body = json!({
                "model": self.model,
                "temperature": 0,
                "messages": [{"role": "user", "content": question}],
            });

            if let Some(l) = limiter {
                l.acquire().await;
            }
            let resp = client
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(&body)
                .timeout(timeout)
                .send()
                .await
                .map_err(|e| e.to_string())?;
            let status = resp.status();
            if !status.is_success() {
                return Err(format!("HTTP {status}"));
            }

            let data: serde_json::Value = resp.json().await.map_err(|e| e.to_string())?;
            let answer = data["choices"][0]["message"]["content"]
                .as_str()
                .unwrap_or("");

            Ok(clean_answer(answer))
        })
    }
}

/// Post-process a free-text answer into a validated "Institution (XX)"
/// string, or `None` if the answer is a refusal or fails the shape check.
pub fn clean_answer(answer: &str) -> Option<String> {
    let mut text = CITATION_MARKER_RE.replace_all(answer, "").to_string();
    text = text.trim().trim_matches(['"', '\'']).trim().to_string();

    let lower = text.to_lowercase();
    if REFUSAL_MARKERS.iter().any(|m| lower.contains(m)) {
        return None;
    }

    // Full-sentence answers: keep what follows "was"/"is".
    if !INSTITUTION_RE.is_match(&text) {
        for verb in [" was ", " is "] {
            if let Some(pos) = text.find(verb) {
                text = text[pos + verb.len()..].trim().to_string();
                break;
            }
        }
    }

    text = text
        .trim_end_matches('.')
        .trim()
        .trim_matches(['"', '\''])
        .to_string();

    let caps = INSTITUTION_RE.captures(&text)?;
    let institution = caps.get(1)?.as_str().trim();
    let country = caps.get(2)?.as_str();
    Some(format!("{institution} ({country})"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_shape_passes_through() {
        assert_eq!(clean_answer("MIT (US)"), Some("MIT (US)".into()));
    }

    #[test]
    fn sentence_answer_extracts_after_was() {
        assert_eq!(
            clean_answer("Norbert Wiener's affiliation was Massachusetts Institute of Technology (US)."),
            Some("Massachusetts Institute of Technology (US)".into())
        );
    }

    #[test]
    fn sentence_answer_extracts_after_is() {
        assert_eq!(
            clean_answer("The author's affiliation is ETH Zurich (CH)"),
            Some("ETH Zurich (CH)".into())
        );
    }

    #[test]
    fn citation_markers_are_stripped() {
        assert_eq!(
            clean_answer("MIT (US)[1][2]"),
            Some("MIT (US)".into())
        );
    }

    #[test]
    fn unknown_is_rejected() {
        assert_eq!(clean_answer("Unknown"), None);
        assert_eq!(clean_answer("I don't know the affiliation."), None);
    }

    #[test]
    fn wrong_shape_is_rejected() {
        assert_eq!(clean_answer("Massachusetts Institute of Technology"), None);
        assert_eq!(clean_answer("MIT (USA)"), None);
    }

    #[test]
    fn quoted_answer_is_unwrapped() {
        assert_eq!(clean_answer("\"MIT (US)\""), Some("MIT (US)".into()));
    }
}
