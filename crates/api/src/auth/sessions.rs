//! Session bookkeeping in the auxiliary store
//!
//! One record per issued access token under `session:{user_id}:{token_hash}`,
//! expiring with the token. Records exist so users can see where they are
//! signed in and sign out everywhere; request authentication never reads
//! them. Losing a record only loses that visibility.

use std::time::Duration;

use payroll_shared::store::policy::{self, Operation};
use payroll_shared::AuxStore;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::fingerprint;
use super::middleware::ClientInfo;
use super::users::UserId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub user_id: UserId,
    /// Fingerprint of the access token this session was issued with
    pub token_hash: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    #[serde(with = "time::serde::timestamp")]
    pub issued_at: OffsetDateTime,
    #[serde(with = "time::serde::timestamp")]
    pub expires_at: OffsetDateTime,
}

impl SessionRecord {
    /// Lifetime left at `now`
    pub fn remaining_at(&self, now: OffsetDateTime) -> Duration {
        u64::try_from((self.expires_at - now).whole_seconds())
            .map(Duration::from_secs)
            .unwrap_or(Duration::ZERO)
    }
}

#[derive(Clone, Debug)]
pub struct SessionRegistry {
    store: AuxStore,
}

impl SessionRegistry {
    pub fn new(store: AuxStore) -> Self {
        Self { store }
    }

    fn prefix(user_id: UserId) -> String {
        format!("session:{user_id}:")
    }

    fn key(user_id: UserId, token_hash: &str) -> String {
        format!("session:{user_id}:{token_hash}")
    }

    /// Record a session for a freshly issued access token
    pub async fn record(&self, user_id: UserId, token: &str, client: &ClientInfo, ttl: Duration) {
        let issued_at = OffsetDateTime::now_utc();
        let record = SessionRecord {
            user_id,
            token_hash: fingerprint(token),
            ip_address: client.ip_address.clone(),
            user_agent: client.user_agent.clone(),
            issued_at,
            expires_at: issued_at + ttl,
        };

        let value = match serde_json::to_string(&record) {
            Ok(value) => value,
            Err(e) => {
                tracing::error!(error = %e, user_id = %user_id, "Failed to encode session record");
                return;
            }
        };

        if let Err(err) = self
            .store
            .set_with_ttl(&Self::key(user_id, &record.token_hash), &value, ttl)
            .await
        {
            policy::on_failure(Operation::SessionWrite, &err);
        }
    }

    /// Live sessions of a user, newest first
    pub async fn list_for(&self, user_id: UserId) -> Vec<SessionRecord> {
        let keys = match self.store.scan_prefix(&Self::prefix(user_id)).await {
            Ok(keys) => keys,
            Err(err) => {
                policy::on_failure(Operation::SessionList, &err);
                return Vec::new();
            }
        };

        let mut sessions = Vec::with_capacity(keys.len());
        for key in keys {
            match self.store.get(&key).await {
                Ok(Some(raw)) => match serde_json::from_str::<SessionRecord>(&raw) {
                    Ok(record) => sessions.push(record),
                    Err(e) => tracing::warn!(key = %key, error = %e, "Skipping unreadable session record"),
                },
                // Expired between scan and read
                Ok(None) => {}
                Err(err) => {
                    policy::on_failure(Operation::SessionList, &err);
                    break;
                }
            }
        }

        sessions.sort_by(|a, b| b.issued_at.cmp(&a.issued_at));
        sessions
    }

    /// Drop the record for one access token, returning whether it existed
    pub async fn revoke_one(&self, user_id: UserId, token: &str) -> bool {
        match self
            .store
            .delete(&Self::key(user_id, &fingerprint(token)))
            .await
        {
            Ok(existed) => existed,
            Err(err) => {
                policy::on_failure(Operation::SessionDelete, &err);
                false
            }
        }
    }

    /// Drop every record of a user and return how many were removed.
    ///
    /// Scan then delete, not atomic: a session recorded concurrently may
    /// survive until its token expires.
    pub async fn revoke_all(&self, user_id: UserId) -> u64 {
        let keys = match self.store.scan_prefix(&Self::prefix(user_id)).await {
            Ok(keys) => keys,
            Err(err) => {
                policy::on_failure(Operation::SessionDelete, &err);
                return 0;
            }
        };

        let mut removed = 0;
        for key in keys {
            match self.store.delete(&key).await {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(err) => {
                    policy::on_failure(Operation::SessionDelete, &err);
                    break;
                }
            }
        }

        tracing::info!(user_id = %user_id, removed = removed, "Revoked all sessions");
        removed
    }
}
