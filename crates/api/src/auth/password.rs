//! Password hashing and strength rules

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
#[cfg(test)]
use argon2::{Algorithm, Params, Version};

use super::error::AuthError;

pub const MIN_PASSWORD_LENGTH: usize = 8;

const SPECIAL_CHARACTERS: &str = "!@#$%^&*(),.?\":{}|<>";

#[cfg(not(test))]
fn hasher() -> Argon2<'static> {
    Argon2::default()
}

// Minimal cost so the test suite is not dominated by hashing
#[cfg(test)]
fn hasher() -> Argon2<'static> {
    let params = Params::new(1024, 1, 1, None).unwrap_or_default();
    Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
}

/// Hash a password into a PHC string (Argon2id, random salt)
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    hasher()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Internal(format!("password hashing failed: {e}")))
}

/// Check a password against a stored PHC string.
///
/// A malformed stored hash verifies as `false`.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored_hash) else {
        tracing::warn!("Stored password hash is not a valid PHC string");
        return false;
    };
    hasher()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// Hash on the blocking pool so request workers are not stalled
pub async fn hash_password_async(password: String) -> Result<String, AuthError> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| AuthError::Internal(format!("hashing task failed: {e}")))?
}

pub async fn verify_password_async(password: String, stored_hash: String) -> bool {
    tokio::task::spawn_blocking(move || verify_password(&password, &stored_hash))
        .await
        .unwrap_or(false)
}

/// Hash of a random secret nobody knows, used to spend the same time on
/// unknown accounts as on known ones
pub fn generate_impossible_hash() -> Result<String, AuthError> {
    let secret: [u8; 32] = rand::random();
    hash_password(&hex::encode(secret))
}

/// Reject passwords that do not meet the minimum strength rules
pub fn validate_password_strength(password: &str) -> Result<(), AuthError> {
    let weak = |msg: &str| Err(AuthError::WeakPassword(msg.to_string()));

    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return weak("Password must be at least 8 characters long");
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        return weak("Password must contain at least one uppercase letter");
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        return weak("Password must contain at least one lowercase letter");
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return weak("Password must contain at least one digit");
    }
    if !password.chars().any(|c| SPECIAL_CHARACTERS.contains(c)) {
        return weak("Password must contain at least one special character");
    }
    Ok(())
}
