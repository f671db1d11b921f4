//! Signed bearer credentials
//!
//! HS256 JWTs carrying `{sub, exp, iat, jti, type}`. The `type` claim keeps
//! access and refresh tokens from standing in for each other. Verification
//! checks signature, expiry and kind together and reports every failure as
//! the same [`CredentialError::Invalid`].

use std::time::Duration;

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::error::CredentialError;
use super::users::UserId;

/// Default access token lifetime
pub const DEFAULT_ACCESS_TTL: Duration = Duration::from_secs(15 * 60);

/// Default refresh token lifetime
pub const DEFAULT_REFRESH_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

impl TokenType {
    pub fn as_str(self) -> &'static str {
        match self {
            TokenType::Access => "access",
            TokenType::Refresh => "refresh",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User ID, decimal
    pub sub: String,
    pub exp: i64,
    pub iat: i64,
    pub jti: String,
    #[serde(rename = "type")]
    pub token_type: TokenType,
}

impl Claims {
    pub fn user_id(&self) -> Result<UserId, CredentialError> {
        self.sub
            .parse::<i64>()
            .map(UserId)
            .map_err(|_| CredentialError::Invalid)
    }

    /// Lifetime left at `now`, zero once expired
    pub fn remaining_at(&self, now: OffsetDateTime) -> Duration {
        u64::try_from(self.exp - now.unix_timestamp())
            .map(Duration::from_secs)
            .unwrap_or(Duration::ZERO)
    }

    pub fn remaining(&self) -> Duration {
        self.remaining_at(OffsetDateTime::now_utc())
    }
}

/// Access and refresh token issued together
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds
    pub expires_in: u64,
}

#[derive(Clone)]
pub struct JwtManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl JwtManager {
    pub fn new(secret: &str, access_ttl: Duration, refresh_ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            access_ttl,
            refresh_ttl,
        }
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    /// Sign a token of `kind` for `subject` valid for `ttl` from now
    pub fn issue(
        &self,
        subject: UserId,
        kind: TokenType,
        ttl: Duration,
    ) -> Result<String, CredentialError> {
        self.issue_at(subject, kind, ttl, OffsetDateTime::now_utc())
    }

    /// Sign a token as if issued at `issued_at`
    pub fn issue_at(
        &self,
        subject: UserId,
        kind: TokenType,
        ttl: Duration,
        issued_at: OffsetDateTime,
    ) -> Result<String, CredentialError> {
        let iat = issued_at.unix_timestamp();
        let ttl_secs = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
        let claims = Claims {
            sub: subject.to_string(),
            exp: iat.saturating_add(ttl_secs),
            iat,
            jti: Uuid::new_v4().to_string(),
            token_type: kind,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key).map_err(|e| {
            tracing::error!(error = %e, kind = kind.as_str(), "Failed to sign token");
            CredentialError::Signing(e.to_string())
        })
    }

    /// Fresh access + refresh pair with the configured lifetimes
    pub fn issue_pair(&self, subject: UserId) -> Result<TokenPair, CredentialError> {
        Ok(TokenPair {
            access_token: self.issue(subject, TokenType::Access, self.access_ttl)?,
            refresh_token: self.issue(subject, TokenType::Refresh, self.refresh_ttl)?,
            expires_in: self.access_ttl.as_secs(),
        })
    }

    /// Decode and validate a token of the expected kind
    pub fn decode(&self, token: &str, expected: TokenType) -> Result<Claims, CredentialError> {
        let claims = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| {
                tracing::debug!(error = %e, "Token rejected");
                CredentialError::Invalid
            })?
            .claims;

        if claims.token_type != expected {
            tracing::debug!(
                expected = expected.as_str(),
                actual = claims.token_type.as_str(),
                "Token kind mismatch"
            );
            return Err(CredentialError::Invalid);
        }
        Ok(claims)
    }

    /// Subject of a valid token of the expected kind
    pub fn verify(&self, token: &str, expected: TokenType) -> Result<UserId, CredentialError> {
        self.decode(token, expected)?.user_id()
    }
}

impl std::fmt::Debug for JwtManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtManager")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish_non_exhaustive()
    }
}
