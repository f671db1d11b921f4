//! API routes

pub mod auth;
pub mod health;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::{
    auth::require_auth,
    security::global_rate_limit_middleware,
    state::AppState,
};

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    // Public auth routes
    let public_auth = Router::new()
        .route("/login", post(auth::login))
        .route("/refresh", post(auth::refresh))
        .route("/forgot-password", post(auth::forgot_password))
        .route("/reset-password", post(auth::reset_password));

    // Routes that need a valid access token
    let protected_auth = Router::new()
        .route("/logout", post(auth::logout))
        .route("/logout-all", post(auth::logout_all))
        .route("/me", get(auth::me))
        .route("/sessions", get(auth::sessions))
        .route("/change-password", post(auth::change_password))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth));

    let api_v1 = Router::new()
        .nest("/auth", public_auth.merge(protected_auth))
        .route("/health", get(health::health));

    Router::new()
        .route("/health", get(health::health))
        .nest("/api/v1", api_v1)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            global_rate_limit_middleware,
        ))
        .with_state(state)
}
