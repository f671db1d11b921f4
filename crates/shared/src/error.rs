//! Auxiliary store errors

use thiserror::Error;

/// Result alias for auxiliary store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Failure talking to the auxiliary key-value store.
///
/// These never reach HTTP callers: every caller resolves them through the
/// failure-policy table in [`crate::store::policy`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// Backend unreachable, or the adapter is backing off after a recent failure
    #[error("auxiliary store unavailable: {0}")]
    Unavailable(String),

    /// Call exceeded the configured deadline
    #[error("auxiliary store call timed out after {0}ms")]
    Timeout(u64),

    /// Backend answered with an error
    #[error("auxiliary store error: {0}")]
    Backend(String),

    /// Stored value could not be decoded
    #[error("malformed value for key {key}: {reason}")]
    Codec { key: String, reason: String },
}

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_io_error() || err.is_connection_refusal() || err.is_connection_dropped() {
            Self::Unavailable(err.to_string())
        } else if err.is_timeout() {
            Self::Unavailable(format!("timeout: {err}"))
        } else {
            Self::Backend(err.to_string())
        }
    }
}
