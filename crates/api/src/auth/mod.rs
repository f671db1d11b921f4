//! Authentication module for the payroll API

#[cfg(test)]
mod edge_case_tests;
pub mod error;
pub mod jwt;
pub mod middleware;
pub mod password;
pub mod reset;
pub mod revocation;
pub mod roles;
pub mod service;
pub mod sessions;
#[cfg(test)]
pub(crate) mod testutil;
pub mod users;

use sha2::{Digest, Sha256};

pub use error::{AuthError, CredentialError, TicketError};
pub use jwt::{Claims, JwtManager, TokenPair, TokenType};
pub use middleware::{require_auth, AccessToken, AuthUser, ClientInfo, TrustedProxies};
pub use password::{
    generate_impossible_hash, hash_password, validate_password_strength, verify_password,
};
pub use reset::{LogDelivery, ResetDelivery, ResetTicketIssuer};
pub use revocation::RevocationRegistry;
pub use roles::{Permission, Role};
pub use service::{AuthService, AuthSettings, LoginResponse};
pub use sessions::{SessionRecord, SessionRegistry};
pub use users::{PgUserRepository, User, UserId, UserRepository, UserSummary};

/// SHA-256 hex digest of a bearer token or ticket.
///
/// Store keys carry this instead of the raw secret.
pub fn fingerprint(secret: &str) -> String {
    hex::encode(Sha256::digest(secret.as_bytes()))
}
