//! Response hardening and whole-API rate limiting

use axum::{
    extract::{Request, State},
    http::{header, HeaderName, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};

use payroll_shared::RateDecision;

use crate::auth::{AuthError, ClientInfo};
use crate::state::AppState;

/// Rate limit scope shared by every API request
pub const GLOBAL_SCOPE: &str = "global";

/// Paths never counted by the global limiter
const RATE_LIMIT_EXEMPT: &[&str] = &["/health", "/api/v1/health"];

const CONTENT_SECURITY_POLICY: &str = "default-src 'self'; \
    script-src 'self'; \
    style-src 'self' 'unsafe-inline'; \
    img-src 'self' data: https:; \
    font-src 'self' data:; \
    connect-src 'self'; \
    frame-ancestors 'none'";

/// Add security headers to every response
pub async fn security_headers_middleware(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(
        header::X_XSS_PROTECTION,
        HeaderValue::from_static("1; mode=block"),
    );
    headers.insert(
        header::STRICT_TRANSPORT_SECURITY,
        HeaderValue::from_static("max-age=31536000; includeSubDomains"),
    );
    headers.insert(
        header::REFERRER_POLICY,
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );
    headers.insert(
        HeaderName::from_static("permissions-policy"),
        HeaderValue::from_static("geolocation=(), microphone=(), camera=()"),
    );
    headers.insert(
        header::CONTENT_SECURITY_POLICY,
        HeaderValue::from_static(CONTENT_SECURITY_POLICY),
    );

    response
}

/// Per-source request cap across the whole API.
///
/// Health checks are exempt so probes keep working under load.
pub async fn global_rate_limit_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    if RATE_LIMIT_EXEMPT.contains(&request.uri().path()) {
        return next.run(request).await;
    }

    let (parts, body) = request.into_parts();
    let client = ClientInfo::from_parts(&parts, &state.trusted_proxies);
    let request = Request::from_parts(parts, body);

    let decision = state
        .auth
        .rate_limiter()
        .check(GLOBAL_SCOPE, client.rate_identity(), state.global_rate)
        .await;

    match decision {
        RateDecision::Allowed { .. } => next.run(request).await,
        RateDecision::Limited { retry_after } => AuthError::RateLimited {
            retry_after_secs: retry_after.as_secs().max(1),
        }
        .into_response(),
    }
}
