//! Behavior of each auth operation when the auxiliary store is unavailable.
//!
//! Core login must keep working with the store gone. The price is that the
//! protections living in the store switch off. Which ones switch off, and in
//! which direction, is decided here in one table instead of at each call
//! site:
//!
//! | Operation | On failure | Consequence |
//! |-----------|------------|-------------|
//! | `RateLimitCheck` | Allow | login rate limiting disabled |
//! | `LockoutCheck` | Allow | existing locks not enforced |
//! | `LockoutRecordFailure` | Skip | new failures not counted |
//! | `LockoutReset` | Skip | counter left to expire |
//! | `RevocationCheck` | Allow | logged-out tokens valid until expiry |
//! | `RevocationWrite` | Skip | logout cannot blacklist the token |
//! | `RefreshCutoffCheck` | Allow | refresh tokens issued before a password reset still work |
//! | `RefreshCutoffWrite` | Skip | password reset cannot cut off refresh tokens |
//! | `SessionWrite` | Skip | session not listed |
//! | `SessionList` | Skip | empty session list |
//! | `SessionDelete` | Skip | session record expires on its own |
//! | `TicketIssue` | Deny | no reset ticket is delivered |
//! | `TicketRedeem` | Deny | ticket reported invalid |

use crate::error::StoreError;

/// Store-backed operation whose failure behavior is fixed by policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    RateLimitCheck,
    LockoutCheck,
    LockoutRecordFailure,
    LockoutReset,
    RevocationCheck,
    RevocationWrite,
    RefreshCutoffCheck,
    RefreshCutoffWrite,
    SessionWrite,
    SessionList,
    SessionDelete,
    TicketIssue,
    TicketRedeem,
}

/// What to do when the store cannot answer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnFailure {
    /// Let the request through as if the check passed
    Allow,
    /// Refuse the request as if the check failed
    Deny,
    /// Drop the side effect and continue
    Skip,
}

impl OnFailure {
    pub fn allows(self) -> bool {
        matches!(self, Self::Allow)
    }

    pub fn denies(self) -> bool {
        matches!(self, Self::Deny)
    }
}

impl Operation {
    pub const ALL: [Operation; 13] = [
        Operation::RateLimitCheck,
        Operation::LockoutCheck,
        Operation::LockoutRecordFailure,
        Operation::LockoutReset,
        Operation::RevocationCheck,
        Operation::RevocationWrite,
        Operation::RefreshCutoffCheck,
        Operation::RefreshCutoffWrite,
        Operation::SessionWrite,
        Operation::SessionList,
        Operation::SessionDelete,
        Operation::TicketIssue,
        Operation::TicketRedeem,
    ];

    /// The policy table
    pub const fn on_failure(self) -> OnFailure {
        match self {
            Operation::RateLimitCheck => OnFailure::Allow,
            Operation::LockoutCheck => OnFailure::Allow,
            Operation::LockoutRecordFailure => OnFailure::Skip,
            Operation::LockoutReset => OnFailure::Skip,
            Operation::RevocationCheck => OnFailure::Allow,
            Operation::RevocationWrite => OnFailure::Skip,
            Operation::RefreshCutoffCheck => OnFailure::Allow,
            Operation::RefreshCutoffWrite => OnFailure::Skip,
            Operation::SessionWrite => OnFailure::Skip,
            Operation::SessionList => OnFailure::Skip,
            Operation::SessionDelete => OnFailure::Skip,
            Operation::TicketIssue => OnFailure::Deny,
            Operation::TicketRedeem => OnFailure::Deny,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Operation::RateLimitCheck => "rate_limit_check",
            Operation::LockoutCheck => "lockout_check",
            Operation::LockoutRecordFailure => "lockout_record_failure",
            Operation::LockoutReset => "lockout_reset",
            Operation::RevocationCheck => "revocation_check",
            Operation::RevocationWrite => "revocation_write",
            Operation::RefreshCutoffCheck => "refresh_cutoff_check",
            Operation::RefreshCutoffWrite => "refresh_cutoff_write",
            Operation::SessionWrite => "session_write",
            Operation::SessionList => "session_list",
            Operation::SessionDelete => "session_delete",
            Operation::TicketIssue => "ticket_issue",
            Operation::TicketRedeem => "ticket_redeem",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Look up and log the degraded behavior for a failed store call
pub fn on_failure(operation: Operation, err: &StoreError) -> OnFailure {
    let behavior = operation.on_failure();
    tracing::warn!(
        operation = %operation,
        behavior = ?behavior,
        error = %err,
        "Auxiliary store failure, applying degraded default"
    );
    behavior
}
