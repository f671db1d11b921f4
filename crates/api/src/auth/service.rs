//! Authentication orchestration
//!
//! Login runs the abuse checks before touching credentials:
//!
//! 1. per-source rate limit (429)
//! 2. per-identifier lockout (403)
//! 3. password check; a failure counts toward the lockout
//! 4. token pair, session record
//!
//! Request authentication consults only the revocation registry and the
//! token itself, so a store outage leaves login and authentication working
//! with the store-backed protections switched off.

use std::sync::Arc;
use std::time::Duration;

use payroll_shared::{
    AuxStore, LockoutConfig, LockoutTracker, RateDecision, RateLimitConfig, RateLimiter,
};
use serde::Serialize;
use time::OffsetDateTime;

use super::error::AuthError;
use super::jwt::{JwtManager, TokenType};
use super::middleware::{AuthUser, ClientInfo};
use super::password::{
    generate_impossible_hash, hash_password_async, validate_password_strength,
    verify_password_async,
};
use super::reset::{ResetDelivery, ResetTicketIssuer, DEFAULT_TICKET_TTL};
use super::revocation::RevocationRegistry;
use super::sessions::{SessionRecord, SessionRegistry};
use super::users::{User, UserId, UserRepository, UserSummary};

/// Rate limit scope for login attempts
pub const LOGIN_SCOPE: &str = "login";

/// Rate limit scope for reset ticket requests
pub const PASSWORD_RESET_SCOPE: &str = "password-reset";

#[derive(Debug, Clone, Copy)]
pub struct AuthSettings {
    pub login_rate: RateLimitConfig,
    pub lockout: LockoutConfig,
    pub reset_ticket_ttl: Duration,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            login_rate: RateLimitConfig::login(),
            lockout: LockoutConfig::default(),
            reset_ticket_ttl: DEFAULT_TICKET_TTL,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    pub expires_in: u64,
    pub user: UserSummary,
}

pub struct AuthService {
    jwt: JwtManager,
    users: Arc<dyn UserRepository>,
    rate_limiter: RateLimiter,
    lockout: LockoutTracker,
    revocations: RevocationRegistry,
    sessions: SessionRegistry,
    tickets: ResetTicketIssuer,
    delivery: Arc<dyn ResetDelivery>,
    settings: AuthSettings,
    dummy_hash: String,
}

impl AuthService {
    pub fn new(
        jwt: JwtManager,
        users: Arc<dyn UserRepository>,
        store: AuxStore,
        delivery: Arc<dyn ResetDelivery>,
        settings: AuthSettings,
    ) -> Result<Self, AuthError> {
        Ok(Self {
            jwt,
            users,
            rate_limiter: RateLimiter::new(store.clone()),
            lockout: LockoutTracker::new(store.clone(), settings.lockout),
            revocations: RevocationRegistry::new(store.clone()),
            sessions: SessionRegistry::new(store.clone()),
            tickets: ResetTicketIssuer::new(store),
            delivery,
            settings,
            dummy_hash: generate_impossible_hash()?,
        })
    }

    pub fn jwt(&self) -> &JwtManager {
        &self.jwt
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }

    /// Exchange email and password for a token pair
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        client: &ClientInfo,
    ) -> Result<LoginResponse, AuthError> {
        self.enforce_rate(LOGIN_SCOPE, client).await?;

        let threshold = self.settings.lockout.threshold;
        if self.lockout.is_locked(email, threshold).await {
            let remaining_seconds = self.lock_seconds(email).await;
            tracing::warn!(
                ip = client.rate_identity(),
                remaining_seconds = remaining_seconds,
                "Login attempt on locked account"
            );
            return Err(AuthError::AccountLocked { remaining_seconds });
        }

        let user = self.users.find_by_email(email).await?;
        // Unknown accounts still pay for one hash verification
        let stored_hash = user
            .as_ref()
            .map_or_else(|| self.dummy_hash.clone(), |u| u.password_hash.clone());
        let verified = verify_password_async(password.to_string(), stored_hash).await;

        let user = match user {
            Some(user) if verified => user,
            _ => {
                let failures = self.lockout.record_failure(email).await;
                tracing::info!(
                    ip = client.rate_identity(),
                    failures = failures,
                    "Login failed"
                );
                if failures >= threshold {
                    return Err(AuthError::AccountLocked {
                        remaining_seconds: self.lock_seconds(email).await,
                    });
                }
                return Err(AuthError::InvalidCredentials);
            }
        };

        self.lockout.reset(email).await;

        if !user.is_active {
            tracing::info!(user_id = %user.id, "Login refused for inactive user");
            return Err(AuthError::InactiveUser);
        }

        let response = self.open_session(&user, client).await?;
        tracing::info!(user_id = %user.id, role = %user.role, "User logged in");
        Ok(response)
    }

    /// Exchange a refresh token for a new pair; the presented token is spent
    pub async fn refresh(
        &self,
        refresh_token: &str,
        client: &ClientInfo,
    ) -> Result<LoginResponse, AuthError> {
        let claims = self.jwt.decode(refresh_token, TokenType::Refresh)?;
        let user_id = claims.user_id()?;

        if self.revocations.is_revoked(refresh_token).await {
            tracing::info!(user_id = %user_id, "Revoked refresh token presented");
            return Err(AuthError::InvalidToken);
        }
        if self.revocations.refresh_cut_off(user_id, claims.iat).await {
            tracing::info!(user_id = %user_id, "Refresh token predates credential change");
            return Err(AuthError::InvalidToken);
        }

        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .filter(|u| u.is_active)
            .ok_or(AuthError::InvalidToken)?;

        self.revocations
            .revoke(refresh_token, claims.remaining())
            .await;
        self.open_session(&user, client).await
    }

    /// Revoke the access token (and a refresh token, if supplied) of the caller
    pub async fn logout(&self, user_id: UserId, access_token: &str, refresh_token: Option<&str>) {
        if let Ok(claims) = self.jwt.decode(access_token, TokenType::Access) {
            self.revocations
                .revoke(access_token, claims.remaining())
                .await;
        }
        self.sessions.revoke_one(user_id, access_token).await;

        if let Some(refresh_token) = refresh_token {
            match self.jwt.decode(refresh_token, TokenType::Refresh) {
                Ok(claims) if claims.user_id() == Ok(user_id) => {
                    self.revocations
                        .revoke(refresh_token, claims.remaining())
                        .await;
                }
                _ => tracing::debug!(user_id = %user_id, "Ignoring unusable refresh token on logout"),
            }
        }

        tracing::info!(user_id = %user_id, "User logged out");
    }

    /// Log a user out everywhere: every recorded access token is revoked and
    /// every refresh token issued so far stops working
    pub async fn revoke_all_sessions(&self, user_id: UserId) -> u64 {
        let now = OffsetDateTime::now_utc();
        for session in self.sessions.list_for(user_id).await {
            self.revocations
                .revoke_fingerprint(&session.token_hash, session.remaining_at(now))
                .await;
        }
        self.revocations
            .cut_off_refresh(user_id, self.jwt.refresh_ttl())
            .await;
        self.sessions.revoke_all(user_id).await
    }

    pub async fn list_sessions(&self, user_id: UserId) -> Vec<SessionRecord> {
        self.sessions.list_for(user_id).await
    }

    /// Start a password reset. Succeeds identically whether or not the
    /// account exists.
    pub async fn forgot_password(&self, email: &str, client: &ClientInfo) -> Result<(), AuthError> {
        self.enforce_rate(PASSWORD_RESET_SCOPE, client).await?;

        let Some(user) = self.users.find_by_email(email).await?.filter(|u| u.is_active) else {
            tracing::debug!("Password reset requested for unknown or inactive account");
            return Ok(());
        };

        match self
            .tickets
            .issue(user.id, self.settings.reset_ticket_ttl)
            .await
        {
            Ok(ticket) => self.delivery.deliver(&user, &ticket).await,
            Err(e) => tracing::warn!(user_id = %user.id, error = %e, "No reset ticket issued"),
        }
        Ok(())
    }

    /// Redeem a reset ticket and set a new password
    pub async fn reset_password(&self, ticket: &str, new_password: &str) -> Result<(), AuthError> {
        validate_password_strength(new_password)?;

        let user_id = self.tickets.redeem(ticket).await?;
        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::InvalidTicket)?;

        self.set_password(&user, new_password).await?;
        tracing::info!(user_id = %user.id, "Password reset");
        Ok(())
    }

    /// Change the caller's password after re-checking the current one
    pub async fn change_password(
        &self,
        user_id: UserId,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::InvalidToken)?;

        // Wrong current passwords count toward the same lockout as login
        let threshold = self.settings.lockout.threshold;
        if self.lockout.is_locked(&user.email, threshold).await {
            return Err(AuthError::AccountLocked {
                remaining_seconds: self.lock_seconds(&user.email).await,
            });
        }

        if !verify_password_async(current_password.to_string(), user.password_hash.clone()).await {
            let failures = self.lockout.record_failure(&user.email).await;
            tracing::info!(
                user_id = %user.id,
                failures = failures,
                "Password change refused: current password incorrect"
            );
            if failures >= threshold {
                return Err(AuthError::AccountLocked {
                    remaining_seconds: self.lock_seconds(&user.email).await,
                });
            }
            return Err(AuthError::IncorrectPassword);
        }
        self.lockout.reset(&user.email).await;
        validate_password_strength(new_password)?;

        self.set_password(&user, new_password).await?;
        tracing::info!(user_id = %user.id, "Password changed");
        Ok(())
    }

    /// Resolve a bearer access token to the user it belongs to
    pub async fn authenticate(&self, access_token: &str) -> Result<AuthUser, AuthError> {
        if self.revocations.is_revoked(access_token).await {
            return Err(AuthError::InvalidToken);
        }

        let user_id = self.jwt.verify(access_token, TokenType::Access)?;
        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::InvalidToken)?;
        if !user.is_active {
            return Err(AuthError::InactiveUser);
        }

        Ok(AuthUser {
            id: user.id,
            email: user.email,
            name: user.name,
            role: user.role,
        })
    }

    async fn enforce_rate(&self, scope: &str, client: &ClientInfo) -> Result<(), AuthError> {
        match self
            .rate_limiter
            .check(scope, client.rate_identity(), self.settings.login_rate)
            .await
        {
            RateDecision::Allowed { .. } => Ok(()),
            RateDecision::Limited { retry_after } => Err(AuthError::RateLimited {
                retry_after_secs: retry_after.as_secs().max(1),
            }),
        }
    }

    async fn lock_seconds(&self, email: &str) -> u64 {
        match self.lockout.remaining_lock_seconds(email).await {
            0 => self.settings.lockout.window.as_secs(),
            secs => secs,
        }
    }

    async fn open_session(
        &self,
        user: &User,
        client: &ClientInfo,
    ) -> Result<LoginResponse, AuthError> {
        let pair = self.jwt.issue_pair(user.id)?;
        self.sessions
            .record(user.id, &pair.access_token, client, self.jwt.access_ttl())
            .await;

        Ok(LoginResponse {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            token_type: "bearer",
            expires_in: pair.expires_in,
            user: user.summary(),
        })
    }

    async fn set_password(&self, user: &User, new_password: &str) -> Result<(), AuthError> {
        let hash = hash_password_async(new_password.to_string()).await?;
        self.users.update_password_hash(user.id, &hash).await?;
        let revoked = self.revoke_all_sessions(user.id).await;
        tracing::debug!(user_id = %user.id, revoked = revoked, "Sessions revoked after password change");
        Ok(())
    }
}

impl std::fmt::Debug for AuthService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthService")
            .field("jwt", &self.jwt)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}
