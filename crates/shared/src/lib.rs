// Shared crate clippy configuration
// Test code patterns:
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! Payroll Shared Infrastructure
//!
//! Building blocks used by the API server that do not depend on HTTP:
//!
//! - **Auxiliary store**: TTL-capable key-value adapter over Redis (or an
//!   in-memory backend in tests) that degrades instead of failing
//! - **Rate limiting**: fixed-window request counters keyed by scope and identity
//! - **Lockout**: failed-login counters that escalate to a timed lock
//! - **Database**: Postgres pool construction

pub mod db;
pub mod error;
pub mod lockout;
pub mod rate_limit;
pub mod store;

pub use db::create_pool;
pub use error::{StoreError, StoreResult};
pub use lockout::{LockoutConfig, LockoutTracker};
pub use rate_limit::{RateDecision, RateLimitConfig, RateLimiter};
pub use store::{
    policy::{OnFailure, Operation},
    AuxStore, KvBackend, MemoryBackend, RedisBackend, StoreConfig,
};
