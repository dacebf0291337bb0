//! Tiered resolution of an author's institutional affiliation.
//!
//! Three ranked external sources are consulted strictly in order — the
//! Semantic Scholar academic graph, a conversational AI search (when a
//! credential is configured), and the OpenAlex works index. The first tier
//! to produce a non-null affiliation wins; a miss or a service error in a
//! tier silently advances to the next. Tiers never run concurrently.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub mod mock;
pub mod names;
pub mod rate_limit;
pub mod tiers;
pub mod titles;

pub use names::{authors_match, normalize_name};
pub use rate_limit::{TierLimiter, TierLimiters};
pub use tiers::{LookupQuery, LookupTier};
pub use titles::{normalize_title, titles_match};

/// Years below this are treated as historical works with no resolvable
/// modern affiliation.
pub const MIN_RESOLVABLE_YEAR: i32 = 1900;

/// Confidence attached to a resolved affiliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolveConfidence {
    High,
    Medium,
    Low,
    None,
}

/// Outcome of one resolution attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub affiliation: Option<String>,
    pub confidence: ResolveConfidence,
    /// Name of the tier that produced the hit, `"skipped-historical"` for
    /// pre-1900 works, or `"none"` when every tier missed.
    pub source: String,
}

impl Resolution {
    fn miss(source: &str) -> Self {
        Self {
            affiliation: None,
            confidence: ResolveConfidence::None,
            source: source.to_string(),
        }
    }
}

/// Credentials and tuning for the real tier chain.
#[derive(Debug, Clone, Default)]
pub struct ResolverConfig {
    pub s2_api_key: Option<String>,
    /// Enables Tier 2 when set.
    pub ai_search_key: Option<String>,
    pub openalex_mailto: Option<String>,
    pub lookup_timeout_secs: u64,
}

/// Walks the tier chain for one author/title/year triple.
pub struct AffiliationResolver {
    tiers: Vec<Arc<dyn LookupTier>>,
    limiters: TierLimiters,
    client: reqwest::Client,
    timeout: Duration,
}

impl AffiliationResolver {
    pub fn new(config: &ResolverConfig, client: reqwest::Client) -> Self {
        let mut tiers: Vec<Arc<dyn LookupTier>> = vec![Arc::new(tiers::semantic_scholar::SemanticScholar {
            api_key: config.s2_api_key.clone(),
        })];
        if let Some(ref key) = config.ai_search_key {
            tiers.push(Arc::new(tiers::ai_search::AiSearch::new(key.clone())));
        }
        tiers.push(Arc::new(tiers::openalex::OpenAlex {
            mailto: config.openalex_mailto.clone(),
        }));

        let timeout = Duration::from_secs(if config.lookup_timeout_secs == 0 {
            15
        } else {
            config.lookup_timeout_secs
        });

        Self {
            tiers,
            limiters: TierLimiters::default(),
            client,
            timeout,
        }
    }

    /// Build a resolver over an explicit tier chain (tests).
    pub fn with_tiers(tiers: Vec<Arc<dyn LookupTier>>, client: reqwest::Client) -> Self {
        Self {
            tiers,
            limiters: TierLimiters::default(),
            client,
            timeout: Duration::from_secs(15),
        }
    }

    /// Resolve `author`'s affiliation at the time of `title` (`year` as it
    /// appears on the record, possibly empty or non-numeric).
    ///
    /// Rejects without any network call when the author or title is empty,
    /// or when the year parses below [`MIN_RESOLVABLE_YEAR`].
    pub async fn resolve(&self, author: &str, title: &str, year: &str) -> Resolution {
        if author.trim().is_empty() || title.trim().is_empty() {
            return Resolution::miss("none");
        }

        let parsed_year = parse_year(year);
        if let Some(y) = parsed_year {
            if y < MIN_RESOLVABLE_YEAR {
                tracing::debug!(author, year = y, "skipping historical work");
                return Resolution::miss("skipped-historical");
            }
        }

        let query = LookupQuery {
            author: author.trim().to_string(),
            title: title.trim().to_string(),
            year: parsed_year,
        };

        for tier in &self.tiers {
            // The tier acquires from the limiter itself, before every
            // request it makes.
            let limiter = self.limiters.get(tier.name());
            match tier.lookup(&query, &self.client, self.timeout, limiter).await {
                Ok(Some(affiliation)) => {
                    tracing::info!(author, tier = tier.name(), %affiliation, "affiliation resolved");
                    return Resolution {
                        affiliation: Some(affiliation),
                        confidence: tier.confidence(),
                        source: tier.name().to_string(),
                    };
                }
                Ok(None) => {
                    tracing::debug!(author, tier = tier.name(), "tier miss");
                }
                Err(e) => {
                    tracing::debug!(author, tier = tier.name(), error = %e, "tier error, falling through");
                }
            }
        }

        Resolution::miss("none")
    }
}

/// Leading-digits year parse, so `"1999a"` still reads as 1999.
fn parse_year(year: &str) -> Option<i32> {
    let digits: String = year.trim().chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        None
    } else {
        digits.parse().ok()
    }
}

/// First `max` alphanumeric words of a title, for search queries.
pub fn query_words(title: &str, max: usize) -> Vec<String> {
    title
        .split_whitespace()
        .map(|w| {
            w.chars()
                .filter(|c| c.is_ascii_alphanumeric())
                .collect::<String>()
        })
        .filter(|w| !w.is_empty())
        .take(max)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockTier;
    use std::sync::Mutex;

    fn log() -> Arc<Mutex<Vec<&'static str>>> {
        Arc::new(Mutex::new(Vec::new()))
    }

    #[test]
    fn parse_year_variants() {
        assert_eq!(parse_year("1999"), Some(1999));
        assert_eq!(parse_year("1999a"), Some(1999));
        assert_eq!(parse_year(" 2021 "), Some(2021));
        assert_eq!(parse_year("n.d."), None);
        assert_eq!(parse_year(""), None);
    }

    #[test]
    fn query_words_strips_punctuation() {
        assert_eq!(
            query_words("Cybernetics: Or, Control & Communication", 3),
            vec!["Cybernetics", "Or", "Control"]
        );
    }

    #[tokio::test]
    async fn historical_year_skips_without_network() {
        let log = log();
        let tier = Arc::new(MockTier::new(
            "tier1",
            Ok(Some("MIT (US)".into())),
            log.clone(),
        ));
        let resolver =
            AffiliationResolver::with_tiers(vec![tier.clone()], reqwest::Client::new());

        let res = resolver.resolve("N. Wiener", "Some Treatise", "1850").await;
        assert_eq!(res.affiliation, None);
        assert_eq!(res.source, "skipped-historical");
        assert_eq!(tier.call_count(), 0);
    }

    #[tokio::test]
    async fn empty_inputs_reject_immediately() {
        let log = log();
        let tier = Arc::new(MockTier::new("tier1", Ok(None), log.clone()));
        let resolver =
            AffiliationResolver::with_tiers(vec![tier.clone()], reqwest::Client::new());

        assert_eq!(resolver.resolve("", "Title", "2001").await.source, "none");
        assert_eq!(resolver.resolve("Author", " ", "2001").await.source, "none");
        assert_eq!(tier.call_count(), 0);
    }

    #[tokio::test]
    async fn tiers_run_in_order_and_first_hit_wins() {
        let log = log();
        let t1 = Arc::new(MockTier::new("tier1", Ok(None), log.clone()));
        let t2 = Arc::new(MockTier::new("tier2", Err("HTTP 503".into()), log.clone()));
        let t3 = Arc::new(MockTier::new(
            "tier3",
            Ok(Some("ETH Zurich".into())),
            log.clone(),
        ));
        let resolver = AffiliationResolver::with_tiers(
            vec![t1.clone(), t2.clone(), t3.clone()],
            reqwest::Client::new(),
        );

        let res = resolver.resolve("A. Turing", "On Computable Numbers", "1936").await;
        // 1936 is above the historical cutoff; all three tiers are tried.
        assert_eq!(res.affiliation.as_deref(), Some("ETH Zurich"));
        assert_eq!(res.source, "tier3");
        assert_eq!(*log.lock().unwrap(), vec!["tier1", "tier2", "tier3"]);
    }

    #[tokio::test]
    async fn later_tiers_not_consulted_after_hit() {
        let log = log();
        let t1 = Arc::new(
            MockTier::new("tier1", Ok(Some("MIT (US)".into())), log.clone())
                .with_confidence(ResolveConfidence::High),
        );
        let t2 = Arc::new(MockTier::new("tier2", Ok(Some("Wrong".into())), log.clone()));
        let resolver = AffiliationResolver::with_tiers(
            vec![t1, t2.clone()],
            reqwest::Client::new(),
        );

        let res = resolver.resolve("J. Smith", "A Paper", "2005").await;
        assert_eq!(res.affiliation.as_deref(), Some("MIT (US)"));
        assert_eq!(res.confidence, ResolveConfidence::High);
        assert_eq!(t2.call_count(), 0);
    }

    #[tokio::test]
    async fn limiter_is_handed_to_rate_limited_tiers() {
        let log = log();
        let s2 = Arc::new(MockTier::new("semantic-scholar", Ok(None), log.clone()));
        let ai = Arc::new(MockTier::new(
            "ai-search",
            Ok(Some("MIT (US)".into())),
            log.clone(),
        ));
        let resolver = AffiliationResolver::with_tiers(
            vec![s2.clone(), ai.clone()],
            reqwest::Client::new(),
        );

        resolver.resolve("J. Smith", "A Paper", "2005").await;
        assert!(s2.limiter_seen());
        assert!(!ai.limiter_seen());
    }

    #[tokio::test]
    async fn all_misses_return_none_source() {
        let log = log();
        let t1 = Arc::new(MockTier::new("tier1", Ok(None), log.clone()));
        let t2 = Arc::new(MockTier::new("tier2", Ok(None), log.clone()));
        let resolver =
            AffiliationResolver::with_tiers(vec![t1, t2], reqwest::Client::new());

        let res = resolver.resolve("J. Smith", "A Paper", "2005").await;
        assert_eq!(res.affiliation, None);
        assert_eq!(res.source, "none");
        assert_eq!(res.confidence, ResolveConfidence::None);
    }
}
