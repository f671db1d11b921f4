//! Fixed-window request rate limiting backed by the auxiliary store
//!
//! One counter per `(scope, identity)`, e.g. `("login", "203.0.113.7")`.
//! The first hit in a window creates the counter with the window as its TTL;
//! later hits increment it until it reaches the limit, after which requests
//! are rejected without touching the counter again, so sustained abuse does
//! not grow it. When the window expires the key disappears and the identity
//! starts fresh.
//!
//! Store outages fail open (see [`crate::store::policy`]).

use std::time::Duration;

use crate::store::policy::{self, Operation};
use crate::store::AuxStore;

/// Limit and window for one scope
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub limit: u32,
    pub window: Duration,
}

impl RateLimitConfig {
    pub const fn new(limit: u32, window: Duration) -> Self {
        Self { limit, window }
    }

    /// Login endpoint default: 5 attempts per minute per source address
    pub const fn login() -> Self {
        Self::new(5, Duration::from_secs(60))
    }

    /// Whole-API default: 100 requests per minute per source address
    pub const fn global() -> Self {
        Self::new(100, Duration::from_secs(60))
    }
}

/// Outcome of a rate limit check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed { remaining: u32 },
    Limited { retry_after: Duration },
}

impl RateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed { .. })
    }
}

#[derive(Clone, Debug)]
pub struct RateLimiter {
    store: AuxStore,
}

impl RateLimiter {
    pub fn new(store: AuxStore) -> Self {
        Self { store }
    }

    fn key(scope: &str, identity: &str) -> String {
        format!("rate:{scope}:{identity}")
    }

    /// Count a request and report whether it is within the limit
    pub async fn allow(&self, scope: &str, identity: &str, limit: u32, window: Duration) -> bool {
        self.check(scope, identity, RateLimitConfig::new(limit, window))
            .await
            .is_allowed()
    }

    /// Count a request and report the decision with its retry hint
    pub async fn check(&self, scope: &str, identity: &str, config: RateLimitConfig) -> RateDecision {
        let key = Self::key(scope, identity);
        let limit = i64::from(config.limit);

        let current = match self.store.get_counter(&key).await {
            Ok(current) => current,
            Err(err) => return self.degraded(&err, config),
        };

        if current >= limit {
            return self.limited(scope, identity, &key, config).await;
        }

        match self.store.increment(&key, config.window).await {
            // Concurrent requests may all pass the read above; the
            // post-increment value decides who actually got a slot
            Ok(count) if count <= limit => RateDecision::Allowed {
                remaining: u32::try_from(limit - count).unwrap_or(0),
            },
            Ok(_) => self.limited(scope, identity, &key, config).await,
            Err(err) => self.degraded(&err, config),
        }
    }

    async fn limited(
        &self,
        scope: &str,
        identity: &str,
        key: &str,
        config: RateLimitConfig,
    ) -> RateDecision {
        let retry_after = self
            .store
            .ttl(key)
            .await
            .ok()
            .flatten()
            .filter(|ttl| !ttl.is_zero())
            .unwrap_or(config.window);

        tracing::warn!(
            scope = scope,
            identity = identity,
            limit = config.limit,
            retry_after_secs = retry_after.as_secs(),
            "Rate limit exceeded"
        );
        RateDecision::Limited { retry_after }
    }

    fn degraded(&self, err: &crate::StoreError, config: RateLimitConfig) -> RateDecision {
        if policy::on_failure(Operation::RateLimitCheck, err).allows() {
            RateDecision::Allowed {
                remaining: config.limit,
            }
        } else {
            RateDecision::Limited {
                retry_after: config.window,
            }
        }
    }
}
