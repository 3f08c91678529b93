//! Freshness policy for cached responses

use crate::config::CacheConfig;
use crate::url::domain_matches_any;
use chrono::{DateTime, Duration, Utc};
use url::Url;

/// Decides whether a cached response may still be served
///
/// First-party content on the forever domains is treated as immutable; any
/// other response is fresh for `max_age` after it was fetched.
#[derive(Debug, Clone)]
pub struct CachePolicy {
    forever_domains: Vec<String>,
    max_age: Duration,
}

impl CachePolicy {
    pub fn new(forever_domains: Vec<String>, max_age_secs: u64) -> Self {
        let secs = i64::try_from(max_age_secs).unwrap_or(i64::MAX).min(i64::MAX / 1000);
        let max_age = Duration::seconds(secs);
        Self {
            forever_domains,
            max_age,
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.forever_domains.clone(), config.max_age)
    }

    /// Returns true if responses for `url` never expire
    pub fn is_forever(&self, url: &str) -> bool {
        Url::parse(url)
            .map(|parsed| domain_matches_any(&parsed, &self.forever_domains))
            .unwrap_or(false)
    }

    /// Returns true if a response for `url` fetched at `fetched_at` is fresh at `now`
    pub fn is_fresh(&self, url: &str, fetched_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        self.is_forever(url) || now.signed_duration_since(fetched_at) < self.max_age
    }
}
