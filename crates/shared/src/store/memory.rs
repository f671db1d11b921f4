//! In-memory [`KvBackend`] for tests and single-process development.
//!
//! Expiry is evaluated lazily against [`tokio::time::Instant`], so tests can
//! drive TTLs with `tokio::time::pause()` and `advance()`. The backend can be
//! switched offline to simulate an unreachable store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::time::Instant;

use super::KvBackend;
use crate::error::{StoreError, StoreResult};

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| now < at)
    }
}

/// Shared in-memory key-value map with TTLs.
///
/// Clones share the same data and the same availability switch.
#[derive(Clone)]
pub struct MemoryBackend {
    data: Arc<RwLock<HashMap<String, Entry>>>,
    available: Arc<AtomicBool>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(HashMap::new())),
            available: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Simulate the store going away (`false`) or coming back (`true`)
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of live keys
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.data.read().values().filter(|e| e.is_live(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check(&self) -> StoreResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("memory backend offline".to_string()))
        }
    }

    fn live_value(&self, key: &str, now: Instant) -> Option<String> {
        self.data
            .read()
            .get(key)
            .filter(|e| e.is_live(now))
            .map(|e| e.value.clone())
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KvBackend for MemoryBackend {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.check()?;
        Ok(self.live_value(key, Instant::now()))
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()> {
        self.check()?;
        self.data.write().insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Some(Instant::now() + ttl),
            },
        );
        Ok(())
    }

    async fn increment(&self, key: &str, ttl: Duration) -> StoreResult<i64> {
        self.check()?;
        let now = Instant::now();
        let mut data = self.data.write();

        match data.get_mut(key).filter(|e| e.is_live(now)) {
            Some(entry) => {
                let current = entry.value.parse::<i64>().map_err(|e| StoreError::Codec {
                    key: key.to_string(),
                    reason: e.to_string(),
                })?;
                let next = current + 1;
                entry.value = next.to_string();
                Ok(next)
            }
            None => {
                data.insert(
                    key.to_string(),
                    Entry {
                        value: "1".to_string(),
                        expires_at: Some(now + ttl),
                    },
                );
                Ok(1)
            }
        }
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        self.check()?;
        let now = Instant::now();
        Ok(self
            .data
            .write()
            .remove(key)
            .is_some_and(|e| e.is_live(now)))
    }

    async fn take(&self, key: &str) -> StoreResult<Option<String>> {
        self.check()?;
        let now = Instant::now();
        Ok(self
            .data
            .write()
            .remove(key)
            .filter(|e| e.is_live(now))
            .map(|e| e.value))
    }

    async fn scan_prefix(&self, prefix: &str) -> StoreResult<Vec<String>> {
        self.check()?;
        let now = Instant::now();
        let mut data = self.data.write();
        data.retain(|_, e| e.is_live(now));

        let mut keys: Vec<String> = data
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn ttl(&self, key: &str) -> StoreResult<Option<Duration>> {
        self.check()?;
        let now = Instant::now();
        Ok(self
            .data
            .read()
            .get(key)
            .filter(|e| e.is_live(now))
            .and_then(|e| e.expires_at)
            .map(|at| at.saturating_duration_since(now)))
    }

    async fn ping(&self) -> StoreResult<()> {
        self.check()
    }
}
