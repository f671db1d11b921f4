// API server clippy configuration
#![allow(clippy::single_match)]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! Payroll API Server
//!
//! Serves the authentication surface of the payroll backend: login, token
//! refresh, logout, sessions and password reset.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::{header, HeaderValue, Method};
use axum::middleware;
use payroll_api::{
    auth::{LogDelivery, PgUserRepository},
    create_router,
    security::security_headers_middleware,
    AppState, Config,
};
use payroll_shared::{create_pool, AuxStore, RedisBackend};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,payroll_api=debug,payroll_shared=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Payroll API Server v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env()?;
    tracing::info!(config = ?config, "Configuration loaded");

    tracing::info!("Connecting to database...");
    let pool = create_pool(&config.database_url).await?;
    tracing::info!("Database connection established");

    // The store connects on first use; an unreachable store only degrades auth
    let redis = RedisBackend::open(&config.redis_url)?;
    let store = AuxStore::with_config(Arc::new(redis), config.store_config());
    match store.ping().await {
        Ok(()) => tracing::info!("Auxiliary store reachable"),
        Err(e) => tracing::warn!(
            error = %e,
            "Auxiliary store unreachable at startup, rate limiting, lockout and revocation are disabled until it returns"
        ),
    }

    let users = Arc::new(PgUserRepository::new(pool.clone()));
    let delivery = Arc::new(LogDelivery::new(config.password_reset_url.clone()));
    let state = AppState::new(pool, config.clone(), store, users, delivery)?;

    let allowed_origins: Vec<HeaderValue> = config
        .cors_allowed_origins
        .iter()
        .filter_map(|s| s.parse().ok())
        .collect();
    tracing::info!(
        allowed_origins = ?allowed_origins,
        "CORS configured with {} allowed origins",
        allowed_origins.len()
    );

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed_origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::ACCEPT,
            header::ORIGIN,
        ])
        .expose_headers([header::CONTENT_TYPE, header::RETRY_AFTER])
        .allow_credentials(true);

    let app = create_router(state)
        .layer(middleware::from_fn(security_headers_middleware))
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = config.bind_address.parse()?;
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
