//! Single-use password reset tickets
//!
//! A ticket is 32 random bytes, base64url encoded. Only its fingerprint is
//! stored (`reset:{sha256(ticket)}` → user id), and redemption deletes the
//! entry in the same atomic step that reads it, so a ticket works once.

use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use payroll_shared::store::policy::{self, Operation};
use payroll_shared::{AuxStore, StoreError};

use super::error::TicketError;
use super::fingerprint;
use super::users::{User, UserId};

/// Default ticket lifetime
pub const DEFAULT_TICKET_TTL: Duration = Duration::from_secs(60 * 60);

#[derive(Clone, Debug)]
pub struct ResetTicketIssuer {
    store: AuxStore,
}

impl ResetTicketIssuer {
    pub fn new(store: AuxStore) -> Self {
        Self { store }
    }

    fn key(ticket: &str) -> String {
        format!("reset:{}", fingerprint(ticket))
    }

    /// Create a ticket for `user_id` valid for `ttl`.
    ///
    /// Fails if the store cannot hold the ticket; an undeliverable-but-unstored
    /// ticket would be worse than none.
    pub async fn issue(&self, user_id: UserId, ttl: Duration) -> Result<String, StoreError> {
        let bytes: [u8; 32] = rand::random();
        let ticket = URL_SAFE_NO_PAD.encode(bytes);

        if let Err(err) = self
            .store
            .set_with_ttl(&Self::key(&ticket), &user_id.to_string(), ttl)
            .await
        {
            policy::on_failure(Operation::TicketIssue, &err);
            return Err(err);
        }
        Ok(ticket)
    }

    /// Consume a ticket and return the user it was issued for
    pub async fn redeem(&self, ticket: &str) -> Result<UserId, TicketError> {
        let stored = match self.store.take(&Self::key(ticket)).await {
            Ok(stored) => stored,
            Err(err) => {
                policy::on_failure(Operation::TicketRedeem, &err);
                return Err(TicketError::Invalid);
            }
        };

        stored
            .and_then(|raw| raw.parse::<i64>().ok())
            .map(UserId)
            .ok_or(TicketError::Invalid)
    }
}

/// Out-of-band channel that gets a reset ticket to its user
#[async_trait]
pub trait ResetDelivery: Send + Sync {
    async fn deliver(&self, user: &User, ticket: &str);
}

/// Delivery that only logs that a ticket went out.
///
/// The ticket itself is never written to the log.
#[derive(Debug, Clone)]
pub struct LogDelivery {
    reset_url_base: String,
}

impl LogDelivery {
    pub fn new(reset_url_base: impl Into<String>) -> Self {
        Self {
            reset_url_base: reset_url_base.into(),
        }
    }

    pub fn reset_link(&self, ticket: &str) -> String {
        format!("{}?token={ticket}", self.reset_url_base.trim_end_matches('/'))
    }
}

#[async_trait]
impl ResetDelivery for LogDelivery {
    async fn deliver(&self, user: &User, ticket: &str) {
        let link = self.reset_link(ticket);
        tracing::info!(
            user_id = %user.id,
            link_len = link.len(),
            "Password reset ticket issued, no mail transport configured"
        );
    }
}
