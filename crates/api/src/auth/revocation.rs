//! Revoked-token registry
//!
//! A revoked token is remembered under `blacklist:{sha256(token)}` for the
//! rest of its natural lifetime; once it would have expired anyway the entry
//! goes with it. Password resets additionally record a per-user cutoff under
//! `refresh_cutoff:{user_id}` so refresh tokens issued before the reset stop
//! working without having to enumerate them.

use std::time::Duration;

use payroll_shared::store::policy::{self, Operation};
use payroll_shared::AuxStore;
use time::OffsetDateTime;

use super::fingerprint;
use super::users::UserId;

#[derive(Clone, Debug)]
pub struct RevocationRegistry {
    store: AuxStore,
}

impl RevocationRegistry {
    pub fn new(store: AuxStore) -> Self {
        Self { store }
    }

    fn blacklist_key(token_hash: &str) -> String {
        format!("blacklist:{token_hash}")
    }

    fn cutoff_key(user_id: UserId) -> String {
        format!("refresh_cutoff:{user_id}")
    }

    /// Revoke a raw token for `ttl`, its remaining lifetime
    pub async fn revoke(&self, token: &str, ttl: Duration) {
        self.revoke_fingerprint(&fingerprint(token), ttl).await;
    }

    /// Revoke by token fingerprint, as stored in session records
    pub async fn revoke_fingerprint(&self, token_hash: &str, ttl: Duration) {
        if ttl.is_zero() {
            return;
        }
        if let Err(err) = self
            .store
            .set_with_ttl(&Self::blacklist_key(token_hash), "1", ttl)
            .await
        {
            policy::on_failure(Operation::RevocationWrite, &err);
        }
    }

    /// Whether the token was revoked. Unknown when the store is down, reported as not revoked.
    pub async fn is_revoked(&self, token: &str) -> bool {
        match self
            .store
            .get(&Self::blacklist_key(&fingerprint(token)))
            .await
        {
            Ok(entry) => entry.is_some(),
            Err(err) => !policy::on_failure(Operation::RevocationCheck, &err).allows(),
        }
    }

    /// Invalidate every refresh token of `user_id` issued before now.
    ///
    /// `ttl` should be the refresh token lifetime; older tokens have expired
    /// by the time the cutoff does.
    pub async fn cut_off_refresh(&self, user_id: UserId, ttl: Duration) {
        let now = OffsetDateTime::now_utc().unix_timestamp();
        if let Err(err) = self
            .store
            .set_with_ttl(&Self::cutoff_key(user_id), &now.to_string(), ttl)
            .await
        {
            policy::on_failure(Operation::RefreshCutoffWrite, &err);
        }
    }

    /// Whether a refresh token issued at `issued_at` (unix seconds) predates the user's cutoff.
    ///
    /// Token timestamps have one-second resolution, so a token issued in the
    /// same second as the cutoff survives it.
    pub async fn refresh_cut_off(&self, user_id: UserId, issued_at: i64) -> bool {
        match self.store.get_counter(&Self::cutoff_key(user_id)).await {
            Ok(0) => false,
            Ok(cutoff) => issued_at < cutoff,
            Err(err) => !policy::on_failure(Operation::RefreshCutoffCheck, &err).allows(),
        }
    }
}
