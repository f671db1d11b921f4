//! Auxiliary key-value store
//!
//! Everything the auth control plane shares across worker processes lives
//! here: revocation entries, session records, rate counters, failed-login
//! counters and reset tickets. Each of those is maintained with single-key
//! atomic operations, so the backend only has to offer:
//!
//! | Operation | Semantics |
//! |-----------|-----------|
//! | `get` | read a value |
//! | `set_with_ttl` | write a value that expires |
//! | `increment` | atomic +1, TTL applied only when the key is created |
//! | `delete` | remove a key |
//! | `take` | atomic get-and-delete |
//! | `scan_prefix` | enumerate keys sharing a prefix |
//! | `ttl` | remaining lifetime of a key |
//!
//! [`AuxStore`] wraps a backend with a per-call deadline and remembers recent
//! failures so a dead store costs one timeout per back-off period, not one
//! per request. Callers turn its errors into defaults via [`policy`].

mod memory;
pub mod policy;
mod redis_backend;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Instant;

use crate::error::{StoreError, StoreResult};

pub use self::memory::MemoryBackend;
pub use self::redis_backend::RedisBackend;

/// Default deadline for a single store call
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_millis(250);

/// Default time to skip the backend after a failed call
pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(5);

/// Minimal key-value interface the auth components need.
///
/// Implementations must be safe to share between request handlers. Keys and
/// values are UTF-8 strings; counters are stored as decimal strings.
#[async_trait]
pub trait KvBackend: Send + Sync {
    /// Read a value, `None` if absent or expired
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Write a value that expires after `ttl`
    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()>;

    /// Atomically increment a counter and return the new value.
    ///
    /// A missing key is created with value 1 and the given `ttl`; an existing
    /// key keeps its original expiry.
    async fn increment(&self, key: &str, ttl: Duration) -> StoreResult<i64>;

    /// Delete a key, returning whether it existed
    async fn delete(&self, key: &str) -> StoreResult<bool>;

    /// Atomically read and delete a key
    async fn take(&self, key: &str) -> StoreResult<Option<String>>;

    /// List live keys starting with `prefix`
    async fn scan_prefix(&self, prefix: &str) -> StoreResult<Vec<String>>;

    /// Remaining lifetime, `None` if the key is absent or never expires
    async fn ttl(&self, key: &str) -> StoreResult<Option<Duration>>;

    /// Connectivity probe
    async fn ping(&self) -> StoreResult<()>;
}

/// Adapter tuning
#[derive(Debug, Clone, Copy)]
pub struct StoreConfig {
    /// Deadline applied to every backend call
    pub call_timeout: Duration,
    /// How long to fail fast after a backend failure
    pub backoff: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            call_timeout: DEFAULT_CALL_TIMEOUT,
            backoff: DEFAULT_BACKOFF,
        }
    }
}

/// Resilient handle to the auxiliary store.
///
/// Cheap to clone; all clones share the backend and the back-off marker.
#[derive(Clone)]
pub struct AuxStore {
    backend: Arc<dyn KvBackend>,
    config: StoreConfig,
    unavailable_until: Arc<Mutex<Option<Instant>>>,
}

impl AuxStore {
    /// Wrap a backend with default timeout and back-off
    pub fn new(backend: Arc<dyn KvBackend>) -> Self {
        Self::with_config(backend, StoreConfig::default())
    }

    pub fn with_config(backend: Arc<dyn KvBackend>, config: StoreConfig) -> Self {
        Self {
            backend,
            config,
            unavailable_until: Arc::new(Mutex::new(None)),
        }
    }

    /// In-memory store for tests and local development
    pub fn memory() -> (Self, MemoryBackend) {
        let backend = MemoryBackend::new();
        (Self::new(Arc::new(backend.clone())), backend)
    }

    /// Whether the adapter is currently skipping the backend
    pub fn is_backing_off(&self) -> bool {
        matches!(*self.unavailable_until.lock(), Some(until) if Instant::now() < until)
    }

    pub async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.call(self.backend.get(key)).await
    }

    pub async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()> {
        self.call(self.backend.set_with_ttl(key, value, ttl)).await
    }

    pub async fn increment(&self, key: &str, ttl: Duration) -> StoreResult<i64> {
        self.call(self.backend.increment(key, ttl)).await
    }

    pub async fn delete(&self, key: &str) -> StoreResult<bool> {
        self.call(self.backend.delete(key)).await
    }

    pub async fn take(&self, key: &str) -> StoreResult<Option<String>> {
        self.call(self.backend.take(key)).await
    }

    pub async fn scan_prefix(&self, prefix: &str) -> StoreResult<Vec<String>> {
        self.call(self.backend.scan_prefix(prefix)).await
    }

    pub async fn ttl(&self, key: &str) -> StoreResult<Option<Duration>> {
        self.call(self.backend.ttl(key)).await
    }

    /// Probe the backend directly, ignoring any back-off in effect.
    ///
    /// A successful probe clears the back-off marker.
    pub async fn ping(&self) -> StoreResult<()> {
        let result = match tokio::time::timeout(self.config.call_timeout, self.backend.ping()).await
        {
            Ok(result) => result,
            Err(_) => Err(self.timeout_error()),
        };
        self.record(&result);
        result
    }

    /// Read an integer counter, treating absence as zero
    pub async fn get_counter(&self, key: &str) -> StoreResult<i64> {
        match self.get(key).await? {
            None => Ok(0),
            Some(raw) => raw.parse::<i64>().map_err(|e| StoreError::Codec {
                key: key.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    async fn call<T, F>(&self, fut: F) -> StoreResult<T>
    where
        F: Future<Output = StoreResult<T>>,
    {
        if self.is_backing_off() {
            return Err(StoreError::Unavailable(
                "recent failure, backing off".to_string(),
            ));
        }

        let result = match tokio::time::timeout(self.config.call_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(self.timeout_error()),
        };
        self.record(&result);
        result
    }

    fn timeout_error(&self) -> StoreError {
        StoreError::Timeout(self.config.call_timeout.as_millis() as u64)
    }

    fn record<T>(&self, result: &StoreResult<T>) {
        let mut marker = self.unavailable_until.lock();
        match result {
            // Codec errors mean the store answered; only connectivity trips the back-off
            Ok(_) | Err(StoreError::Codec { .. }) => {
                if marker.take().is_some() {
                    tracing::info!("Auxiliary store reachable again");
                }
            }
            Err(err) => {
                let now = Instant::now();
                if !matches!(*marker, Some(until) if now < until) {
                    tracing::warn!(
                        error = %err,
                        backoff_ms = self.config.backoff.as_millis() as u64,
                        "Auxiliary store call failed, backing off"
                    );
                }
                *marker = Some(now + self.config.backoff);
            }
        }
    }
}

impl std::fmt::Debug for AuxStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuxStore")
            .field("config", &self.config)
            .field("backing_off", &self.is_backing_off())
            .finish()
    }
}
