//! Per-tier request pacing.
//!
//! Each tier that talks to a rate-limited service waits for its governor
//! permit before issuing a request. Lookups are processed one at a time,
//! so a simple direct limiter per tier is sufficient.

use std::collections::HashMap;
use std::time::Duration;

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Paces requests for one lookup tier.
pub struct TierLimiter {
    limiter: DirectLimiter,
}

impl TierLimiter {
    pub fn new(period: Duration) -> Self {
        let quota = Quota::with_period(period).expect("period must be > 0");
        Self {
            limiter: DirectLimiter::direct(quota),
        }
    }

    /// A limiter allowing `n` requests per second.
    pub fn per_second(n: u32) -> Self {
        Self::new(Duration::from_millis(1000 / u64::from(n.max(1))))
    }

    /// Wait until the limiter allows the next request.
    pub async fn acquire(&self) {
        self.limiter.until_ready().await;
    }
}

/// Limiters keyed by tier name.
pub struct TierLimiters {
    limiters: HashMap<&'static str, TierLimiter>,
}

impl Default for TierLimiters {
    fn default() -> Self {
        let mut limiters = HashMap::new();
        // Semantic Scholar keyless guidance is ~1 request per second.
        limiters.insert("semantic-scholar", TierLimiter::per_second(1));
        // OpenAlex allows 10/s for polite clients.
        limiters.insert("openalex", TierLimiter::per_second(10));
        Self { limiters }
    }
}

impl TierLimiters {
    pub fn get(&self, tier_name: &str) -> Option<&TierLimiter> {
        self.limiters.get(tier_name)
    }
}
