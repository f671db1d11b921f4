//! Failed-login tracking and timed account lockout
//!
//! Every failed credential check increments a per-identifier counter. The
//! first failure creates it with the lockout window as TTL, so the window is
//! measured from the first failure. While the count is at or above the
//! threshold the account is locked; the lock lifts when the key expires.
//! A successful login deletes the counter. There is no explicit unlock.
//!
//! Identifiers are trimmed and lower-cased, so `Alice@Example.com ` and
//! `alice@example.com` share one counter.

use std::time::Duration;

use crate::store::policy::{self, Operation};
use crate::store::AuxStore;

/// Default number of failures that locks an account
pub const DEFAULT_LOCKOUT_THRESHOLD: u32 = 5;

/// Default failure-counting window, which is also the lock duration
pub const DEFAULT_LOCKOUT_WINDOW: Duration = Duration::from_secs(15 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockoutConfig {
    pub threshold: u32,
    pub window: Duration,
}

impl Default for LockoutConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_LOCKOUT_THRESHOLD,
            window: DEFAULT_LOCKOUT_WINDOW,
        }
    }
}

#[derive(Clone, Debug)]
pub struct LockoutTracker {
    store: AuxStore,
    config: LockoutConfig,
}

impl LockoutTracker {
    pub fn new(store: AuxStore, config: LockoutConfig) -> Self {
        Self { store, config }
    }

    fn key(identity: &str) -> String {
        format!("failed_login:{}", identity.trim().to_lowercase())
    }

    /// Count a failed attempt and return the number of failures in the window.
    ///
    /// Returns 0 when the store cannot record the failure.
    pub async fn record_failure(&self, identity: &str) -> u32 {
        match self
            .store
            .increment(&Self::key(identity), self.config.window)
            .await
        {
            Ok(count) => {
                let count = u32::try_from(count).unwrap_or(u32::MAX);
                tracing::info!(
                    attempts = count,
                    threshold = self.config.threshold,
                    "Recorded failed login attempt"
                );
                count
            }
            Err(err) => {
                policy::on_failure(Operation::LockoutRecordFailure, &err);
                0
            }
        }
    }

    /// Clear the failure counter after a successful login
    pub async fn reset(&self, identity: &str) {
        if let Err(err) = self.store.delete(&Self::key(identity)).await {
            policy::on_failure(Operation::LockoutReset, &err);
        }
    }

    /// Whether the identifier has reached `threshold` failures in the current window
    pub async fn is_locked(&self, identity: &str, threshold: u32) -> bool {
        match self.store.get_counter(&Self::key(identity)).await {
            Ok(count) => count >= i64::from(threshold),
            Err(err) => !policy::on_failure(Operation::LockoutCheck, &err).allows(),
        }
    }

    /// Seconds until the failure counter expires, 0 if there is none
    pub async fn remaining_lock_seconds(&self, identity: &str) -> u64 {
        self.store
            .ttl(&Self::key(identity))
            .await
            .ok()
            .flatten()
            .map(|ttl| ttl.as_secs().max(1))
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> (LockoutTracker, crate::MemoryBackend) {
        let (store, backend) = AuxStore::memory();
        (LockoutTracker::new(store, LockoutConfig::default()), backend)
    }

    #[tokio::test]
    async fn test_fifth_failure_locks() {
        let (tracker, _backend) = tracker();

        for attempt in 1..=4 {
            assert_eq!(tracker.record_failure("user@example.com").await, attempt);
            assert!(!tracker.is_locked("user@example.com", 5).await);
        }
        assert_eq!(tracker.record_failure("user@example.com").await, 5);
        assert!(tracker.is_locked("user@example.com", 5).await);
    }

    #[tokio::test]
    async fn test_reset_unlocks_immediately() {
        let (tracker, _backend) = tracker();
        for _ in 0..5 {
            tracker.record_failure("user@example.com").await;
        }
        assert!(tracker.is_locked("user@example.com", 5).await);

        tracker.reset("user@example.com").await;
        assert!(!tracker.is_locked("user@example.com", 5).await);
        assert_eq!(tracker.remaining_lock_seconds("user@example.com").await, 0);
    }

    #[tokio::test]
    async fn test_lock_expires_with_window() {
        tokio::time::pause();
        let (tracker, _backend) = tracker();
        for _ in 0..5 {
            tracker.record_failure("user@example.com").await;
        }

        tokio::time::advance(Duration::from_secs(600)).await;
        assert!(tracker.is_locked("user@example.com", 5).await);
        assert_eq!(tracker.remaining_lock_seconds("user@example.com").await, 300);

        tokio::time::advance(Duration::from_secs(300)).await;
        assert!(!tracker.is_locked("user@example.com", 5).await);
    }

    #[tokio::test]
    async fn test_identifier_is_normalized() {
        let (tracker, _backend) = tracker();
        tracker.record_failure("User@Example.com").await;
        assert_eq!(tracker.record_failure(" user@example.com ").await, 2);
    }

    #[tokio::test]
    async fn test_store_outage_cannot_lock_or_count() {
        let (tracker, backend) = tracker();
        for _ in 0..5 {
            tracker.record_failure("user@example.com").await;
        }
        backend.set_available(false);

        assert!(!tracker.is_locked("user@example.com", 5).await);
        assert_eq!(tracker.record_failure("user@example.com").await, 0);
        assert_eq!(tracker.remaining_lock_seconds("user@example.com").await, 0);
    }
}
