//! Authentication middleware and extractors for Axum

use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, FromRef, FromRequestParts, Request, State},
    http::{
        header::{AUTHORIZATION, COOKIE, USER_AGENT},
        request::Parts,
        HeaderMap,
    },
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::error::AuthError;
use super::roles::{Permission, Role};
use super::users::UserId;
use crate::state::AppState;

/// Cookie carrying the access token for browser clients
pub const AUTH_COOKIE: &str = "payroll_auth_token";

/// Authenticated user attached to the request by [`require_auth`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: UserId,
    pub email: String,
    pub name: String,
    pub role: Role,
}

impl AuthUser {
    pub fn has_permission(&self, permission: Permission) -> bool {
        self.role.has_permission(permission)
    }

    /// Fail with 403 unless the user's role grants `permission`
    pub fn require(&self, permission: Permission) -> Result<(), AuthError> {
        if self.has_permission(permission) {
            Ok(())
        } else {
            tracing::warn!(
                user_id = %self.id,
                role = %self.role,
                permission = %permission,
                "Permission denied"
            );
            Err(AuthError::InsufficientPermissions)
        }
    }
}

/// Raw bearer token the request authenticated with, needed for logout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken(pub String);

/// Reverse proxies whose forwarding headers are believed.
///
/// Requests from any other peer are identified by the socket address alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrustedProxies(Arc<Vec<IpAddr>>);

impl TrustedProxies {
    pub fn new(addrs: impl IntoIterator<Item = IpAddr>) -> Self {
        Self(Arc::new(addrs.into_iter().collect()))
    }

    pub fn contains(&self, ip: IpAddr) -> bool {
        self.0.contains(&ip)
    }
}

/// Where a request came from, used for rate limiting and recorded on sessions
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientInfo {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl ClientInfo {
    /// Identity used for per-source rate limiting
    pub fn rate_identity(&self) -> &str {
        self.ip_address.as_deref().unwrap_or("unknown")
    }

    pub fn from_parts(parts: &Parts, trusted: &TrustedProxies) -> Self {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());
        let ip_address =
            extract_ip_address(&parts.headers, peer, trusted).map(|ip| ip.to_string());
        let user_agent = parts
            .headers
            .get(USER_AGENT)
            .and_then(|h| h.to_str().ok())
            .map(String::from);

        Self {
            ip_address,
            user_agent,
        }
    }
}

impl<S> FromRequestParts<S> for ClientInfo
where
    TrustedProxies: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let trusted = TrustedProxies::from_ref(state);
        Ok(ClientInfo::from_parts(parts, &trusted))
    }
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or(AuthError::MissingAuth)
    }
}

impl<S> FromRequestParts<S> for AccessToken
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AccessToken>()
            .cloned()
            .ok_or(AuthError::MissingAuth)
    }
}

/// Extract the access token from an HttpOnly cookie
fn extract_token_from_cookie(headers: &HeaderMap) -> Option<String> {
    let cookies = headers.get(COOKIE)?.to_str().ok()?;
    cookies
        .split(';')
        .map(str::trim)
        .find_map(|cookie| cookie.strip_prefix(AUTH_COOKIE)?.strip_prefix('='))
        .filter(|token| !token.is_empty())
        .map(String::from)
}

/// Extract bearer token from Authorization header or HttpOnly cookie.
/// The header wins when both are present.
pub(crate) fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    if let Some(header) = headers.get(AUTHORIZATION).and_then(|h| h.to_str().ok()) {
        if let Some(token) = header.strip_prefix("Bearer ") {
            let token = token.trim();
            if !token.is_empty() {
                return Some(token.to_string());
            }
        }
    }

    extract_token_from_cookie(headers)
}

fn header_ip(headers: &HeaderMap, name: &str) -> Option<IpAddr> {
    headers.get(name)?.to_str().ok()?.trim().parse().ok()
}

/// Resolve the client address from the socket peer.
///
/// Forwarding headers are only read when the peer is a trusted proxy. The
/// `X-Forwarded-For` chain is walked from the right and the first hop that is
/// not a trusted proxy wins; hops further left are client-controlled. Without
/// a peer address nothing is believed and `None` is returned.
pub(crate) fn extract_ip_address(
    headers: &HeaderMap,
    peer: Option<IpAddr>,
    trusted: &TrustedProxies,
) -> Option<IpAddr> {
    let peer = peer?;
    if !trusted.contains(peer) {
        return Some(peer);
    }

    if let Some(xff) = headers.get("X-Forwarded-For").and_then(|h| h.to_str().ok()) {
        for hop in xff.rsplit(',').map(str::trim) {
            match hop.parse::<IpAddr>() {
                Ok(ip) if trusted.contains(ip) => continue,
                Ok(ip) => return Some(ip),
                Err(_) => break,
            }
        }
    }

    header_ip(headers, "CF-Connecting-IP")
        .or_else(|| header_ip(headers, "X-Real-IP"))
        .or(Some(peer))
}

/// Middleware that requires a valid, unrevoked access token
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();

    let Some(token) = extract_bearer_token(request.headers()) else {
        tracing::debug!(path = %path, "require_auth: no bearer token");
        return AuthError::MissingAuth.into_response();
    };

    match state.auth.authenticate(&token).await {
        Ok(user) => {
            tracing::debug!(
                path = %path,
                user_id = %user.id,
                role = %user.role,
                "require_auth: authenticated"
            );
            request.extensions_mut().insert(user);
            request.extensions_mut().insert(AccessToken(token));
            next.run(request).await
        }
        Err(err) => {
            tracing::info!(path = %path, error = %err, "require_auth: rejected");
            err.into_response()
        }
    }
}
