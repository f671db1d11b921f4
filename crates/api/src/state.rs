//! Application state

use std::sync::Arc;

use axum::extract::FromRef;
use payroll_shared::{AuxStore, RateLimitConfig};
use sqlx::PgPool;

use crate::auth::{
    AuthError, AuthService, JwtManager, ResetDelivery, TrustedProxies, UserRepository,
};
use crate::config::Config;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<Config>,
    /// Auxiliary store handle, also used by the health check
    pub store: AuxStore,
    pub auth: Arc<AuthService>,
    /// Whole-API per-source limit
    pub global_rate: RateLimitConfig,
    /// Peers allowed to report the client address in forwarding headers
    pub trusted_proxies: TrustedProxies,
}

impl FromRef<AppState> for TrustedProxies {
    fn from_ref(state: &AppState) -> Self {
        state.trusted_proxies.clone()
    }
}

impl AppState {
    pub fn new(
        pool: PgPool,
        config: Config,
        store: AuxStore,
        users: Arc<dyn UserRepository>,
        delivery: Arc<dyn ResetDelivery>,
    ) -> Result<Self, AuthError> {
        let jwt = JwtManager::new(
            &config.jwt_secret,
            config.access_token_ttl,
            config.refresh_token_ttl,
        );
        let auth = AuthService::new(jwt, users, store.clone(), delivery, config.auth_settings())?;

        Ok(Self {
            pool,
            global_rate: config.global_rate(),
            trusted_proxies: TrustedProxies::new(config.trusted_proxies.iter().copied()),
            config: Arc::new(config),
            store,
            auth: Arc::new(auth),
        })
    }
}
