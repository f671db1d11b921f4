//! Health check

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub services: ServiceHealth,
}

#[derive(Debug, Serialize)]
pub struct ServiceHealth {
    pub database: &'static str,
    pub redis: &'static str,
}

fn up_down(ok: bool) -> &'static str {
    if ok {
        "up"
    } else {
        "down"
    }
}

/// GET /health
///
/// The database is required, so its loss is reported as 503. Losing the
/// auxiliary store only degrades the service.
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let (database, redis) = tokio::join!(
        sqlx::query_scalar::<_, i32>("SELECT 1").fetch_one(&state.pool),
        state.store.ping()
    );

    if let Err(e) = &database {
        tracing::warn!(error = %e, "Health check: database unreachable");
    }
    if let Err(e) = &redis {
        tracing::warn!(error = %e, "Health check: auxiliary store unreachable");
    }

    let (status_code, status) = match (database.is_ok(), redis.is_ok()) {
        (true, true) => (StatusCode::OK, "healthy"),
        (true, false) => (StatusCode::OK, "degraded"),
        (false, _) => (StatusCode::SERVICE_UNAVAILABLE, "unhealthy"),
    };

    (
        status_code,
        Json(HealthResponse {
            status,
            version: env!("CARGO_PKG_VERSION"),
            services: ServiceHealth {
                database: up_down(database.is_ok()),
                redis: up_down(redis.is_ok()),
            },
        }),
    )
}
