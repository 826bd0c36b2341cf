//! Two-tier sliding-window rate limiting.
//!
//! Each request is classified into a tier by path, then checked against the
//! shared counter store under a `(tier, client_key)` key. Tiers draw from
//! independent counters.

use std::sync::Arc;
use std::time::Duration;

use axum::http::{HeaderName, HeaderValue};
use serde::Serialize;

use crate::config::{Environment, RateLimitConfig};
use crate::observability::metrics;
use crate::routing::matcher::{AnyMatcher, Matcher};
use crate::store::{Clock, CounterStore, StoreError};

pub const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
pub const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// Rate-limit classification of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Public,
    Sensitive,
}

impl Tier {
    pub fn as_str(self) -> &'static str {
        match self {
            Tier::Public => "public",
            Tier::Sensitive => "sensitive",
        }
    }
}

/// Classifies paths into tiers. Depends on nothing but the path.
#[derive(Debug)]
pub struct TierClassifier {
    sensitive: AnyMatcher,
}

impl TierClassifier {
    pub fn new<S: AsRef<str>>(sensitive_prefixes: &[S]) -> Self {
        Self {
            sensitive: AnyMatcher::prefixes(sensitive_prefixes),
        }
    }

    pub fn classify(&self, path: &str) -> Tier {
        if self.sensitive.matches(path) {
            Tier::Sensitive
        } else {
            Tier::Public
        }
    }
}

/// Outcome of a counted check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u64,
    pub remaining: u64,
    /// Epoch milliseconds at which the current window slice ends.
    pub reset_at_ms: u64,
}

impl RateLimitDecision {
    /// The three advisory headers sent with a 429.
    pub fn headers(&self) -> [(HeaderName, HeaderValue); 3] {
        [
            (X_RATELIMIT_LIMIT, HeaderValue::from(self.limit)),
            (X_RATELIMIT_REMAINING, HeaderValue::from(self.remaining)),
            (X_RATELIMIT_RESET, HeaderValue::from(self.reset_at_ms)),
        ]
    }
}

/// How a request got through (or didn't) the limiter.
#[derive(Debug)]
pub enum Admission {
    /// The store was consulted.
    Enforced(RateLimitDecision),
    /// Not production: enforcement skipped without touching the store.
    Disabled,
    /// The store failed; the request is let through.
    FailOpen(StoreError),
}

impl Admission {
    pub fn is_allowed(&self) -> bool {
        match self {
            Admission::Enforced(decision) => decision.allowed,
            Admission::Disabled | Admission::FailOpen(_) => true,
        }
    }

    pub fn decision(&self) -> Option<&RateLimitDecision> {
        match self {
            Admission::Enforced(decision) => Some(decision),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Admission::Enforced(d) if d.allowed => "allowed",
            Admission::Enforced(_) => "limited",
            Admission::Disabled => "disabled",
            Admission::FailOpen(_) => "fail_open",
        }
    }
}

/// Admission control over an injected counter store.
pub struct RateLimiter {
    store: Arc<dyn CounterStore>,
    clock: Arc<dyn Clock>,
    environment: Environment,
    key_prefix: String,
    window_ms: u64,
    public_limit: u64,
    sensitive_limit: u64,
    store_timeout: Duration,
}

impl RateLimiter {
    pub fn new(
        config: &RateLimitConfig,
        environment: Environment,
        store: Arc<dyn CounterStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            clock,
            environment,
            key_prefix: config.key_prefix.clone(),
            window_ms: config.window_secs.saturating_mul(1000),
            public_limit: config.public_limit,
            sensitive_limit: config.sensitive_limit,
            store_timeout: Duration::from_millis(config.store_timeout_ms),
        }
    }

    pub fn limit_for(&self, tier: Tier) -> u64 {
        match tier {
            Tier::Public => self.public_limit,
            Tier::Sensitive => self.sensitive_limit,
        }
    }

    /// Check one request. Never fails: store errors and timeouts fail open.
    pub async fn check(&self, client_key: &str, tier: Tier) -> Admission {
        if !self.environment.is_production() {
            return Admission::Disabled;
        }

        let key = format!("{}:{}:{}", self.key_prefix, tier.as_str(), client_key);
        let limit = self.limit_for(tier);
        let now_ms = self.clock.now_ms();

        let result = tokio::time::timeout(
            self.store_timeout,
            self.store.sliding_window(&key, limit, self.window_ms, now_ms),
        )
        .await
        .unwrap_or(Err(StoreError::Timeout(self.store_timeout)));

        match result {
            Ok(count) => {
                let decision = RateLimitDecision {
                    allowed: count.admitted,
                    limit,
                    remaining: limit.saturating_sub(count.used),
                    reset_at_ms: count.reset_at_ms,
                };
                if !decision.allowed {
                    tracing::warn!(client = %client_key, tier = tier.as_str(), "Rate limit exceeded");
                    metrics::record_rate_limited(tier.as_str());
                }
                Admission::Enforced(decision)
            }
            Err(error) => {
                tracing::warn!(
                    client = %client_key,
                    tier = tier.as_str(),
                    store = self.store.name(),
                    error = %error,
                    "Rate-limit store failed, admitting request (fail-open)"
                );
                metrics::record_store_error(tier.as_str());
                Admission::FailOpen(error)
            }
        }
    }
}
