//! Redis [`KvBackend`]
//!
//! The connection is established on first use rather than at startup, so the
//! API server boots (and serves logins) with Redis down. Once connected,
//! [`ConnectionManager`] handles reconnects on its own.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use tokio::sync::OnceCell;

use super::KvBackend;
use crate::error::{StoreError, StoreResult};

/// Keys returned per SCAN round trip
const SCAN_BATCH: usize = 200;

pub struct RedisBackend {
    client: redis::Client,
    connection: OnceCell<ConnectionManager>,
}

impl RedisBackend {
    /// Parse the URL without connecting
    pub fn open(url: &str) -> StoreResult<Self> {
        let client = redis::Client::open(url)
            .map_err(|e| StoreError::Backend(format!("invalid redis url: {e}")))?;
        Ok(Self {
            client,
            connection: OnceCell::new(),
        })
    }

    async fn connection(&self) -> StoreResult<ConnectionManager> {
        let conn = self
            .connection
            .get_or_try_init(|| async {
                tracing::debug!("Connecting to Redis");
                ConnectionManager::new(self.client.clone()).await
            })
            .await?;
        Ok(conn.clone())
    }
}

/// Redis rejects `EX 0`, and sub-second TTLs round down to it
fn ttl_secs(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

/// Escape glob metacharacters so a key prefix matches literally
fn glob_escape(prefix: &str) -> String {
    let mut out = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('*');
    out
}

#[async_trait]
impl KvBackend for RedisBackend {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let mut conn = self.connection().await?;
        let value: Option<String> = redis::cmd("GET").arg(key).query_async(&mut conn).await?;
        Ok(value)
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()> {
        let mut conn = self.connection().await?;
        let _: () = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("EX")
            .arg(ttl_secs(ttl))
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn increment(&self, key: &str, ttl: Duration) -> StoreResult<i64> {
        let mut conn = self.connection().await?;
        // SET NX seeds the counter with its expiry only when absent; INCR then
        // bumps it. MULTI keeps the pair from interleaving with an expiry.
        let (count,): (i64,) = redis::pipe()
            .atomic()
            .cmd("SET")
            .arg(key)
            .arg(0)
            .arg("EX")
            .arg(ttl_secs(ttl))
            .arg("NX")
            .ignore()
            .cmd("INCR")
            .arg(key)
            .query_async(&mut conn)
            .await?;
        Ok(count)
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        let mut conn = self.connection().await?;
        let removed: i64 = redis::cmd("DEL").arg(key).query_async(&mut conn).await?;
        Ok(removed > 0)
    }

    async fn take(&self, key: &str) -> StoreResult<Option<String>> {
        let mut conn = self.connection().await?;
        // GETDEL (Redis >= 6.2) is atomic, so a ticket cannot be taken twice
        let value: Option<String> = redis::cmd("GETDEL").arg(key).query_async(&mut conn).await?;
        Ok(value)
    }

    async fn scan_prefix(&self, prefix: &str) -> StoreResult<Vec<String>> {
        let mut conn = self.connection().await?;
        let pattern = glob_escape(prefix);
        let mut cursor: u64 = 0;
        let mut keys = Vec::new();

        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await?;
            keys.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }

        // SCAN may return a key more than once across iterations
        keys.sort();
        keys.dedup();
        Ok(keys)
    }

    async fn ttl(&self, key: &str) -> StoreResult<Option<Duration>> {
        let mut conn = self.connection().await?;
        // -2: missing, -1: no expiry
        let secs: i64 = redis::cmd("TTL").arg(key).query_async(&mut conn).await?;
        Ok(u64::try_from(secs).ok().map(Duration::from_secs))
    }

    async fn ping(&self) -> StoreResult<()> {
        let mut conn = self.connection().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}
