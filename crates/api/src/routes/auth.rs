//! Authentication routes

use axum::{body::Bytes, extract::State, Json};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
    auth::{fingerprint, AccessToken, AuthUser, ClientInfo, LoginResponse, Role, UserId},
    error::{ApiError, ApiResult},
    state::AppState,
};

const RESET_REQUESTED_MESSAGE: &str =
    "If the email exists, password reset instructions have been sent";

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct LogoutRequest {
    #[serde(default)]
    pub refresh_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct RevokedResponse {
    pub revoked: u64,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub id: UserId,
    pub email: String,
    pub name: String,
    pub role: Role,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    #[serde(with = "time::serde::timestamp")]
    pub issued_at: OffsetDateTime,
    #[serde(with = "time::serde::timestamp")]
    pub expires_at: OffsetDateTime,
    /// Session of the token making this request
    pub current: bool,
}

fn require_field(value: &str, name: &str) -> ApiResult<()> {
    if value.trim().is_empty() {
        return Err(ApiError::BadRequest(format!("{name} is required")));
    }
    Ok(())
}

/// POST /api/v1/auth/login
pub async fn login(
    State(state): State<AppState>,
    client: ClientInfo,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    require_field(&req.email, "email")?;
    require_field(&req.password, "password")?;

    let response = state.auth.login(&req.email, &req.password, &client).await?;
    Ok(Json(response))
}

/// POST /api/v1/auth/refresh
pub async fn refresh(
    State(state): State<AppState>,
    client: ClientInfo,
    Json(req): Json<RefreshRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let response = state.auth.refresh(&req.refresh_token, &client).await?;
    Ok(Json(response))
}

/// POST /api/v1/auth/logout
///
/// The body is optional; when it names a refresh token that token is revoked too.
pub async fn logout(
    State(state): State<AppState>,
    user: AuthUser,
    AccessToken(token): AccessToken,
    body: Bytes,
) -> ApiResult<Json<MessageResponse>> {
    let req: LogoutRequest = if body.iter().all(u8::is_ascii_whitespace) {
        LogoutRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::BadRequest(format!("invalid logout body: {e}")))?
    };

    state
        .auth
        .logout(user.id, &token, req.refresh_token.as_deref())
        .await;

    Ok(Json(MessageResponse {
        message: "Successfully logged out",
    }))
}

/// POST /api/v1/auth/logout-all
pub async fn logout_all(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<RevokedResponse>> {
    let revoked = state.auth.revoke_all_sessions(user.id).await;
    Ok(Json(RevokedResponse { revoked }))
}

/// GET /api/v1/auth/me
pub async fn me(user: AuthUser) -> Json<MeResponse> {
    Json(MeResponse {
        id: user.id,
        email: user.email,
        name: user.name,
        role: user.role,
    })
}

/// GET /api/v1/auth/sessions
pub async fn sessions(
    State(state): State<AppState>,
    user: AuthUser,
    AccessToken(token): AccessToken,
) -> ApiResult<Json<Vec<SessionResponse>>> {
    let current = fingerprint(&token);
    let sessions = state
        .auth
        .list_sessions(user.id)
        .await
        .into_iter()
        .map(|s| SessionResponse {
            current: s.token_hash == current,
            ip_address: s.ip_address,
            user_agent: s.user_agent,
            issued_at: s.issued_at,
            expires_at: s.expires_at,
        })
        .collect();
    Ok(Json(sessions))
}

/// POST /api/v1/auth/forgot-password
pub async fn forgot_password(
    State(state): State<AppState>,
    client: ClientInfo,
    Json(req): Json<ForgotPasswordRequest>,
) -> ApiResult<Json<MessageResponse>> {
    require_field(&req.email, "email")?;
    state.auth.forgot_password(&req.email, &client).await?;
    Ok(Json(MessageResponse {
        message: RESET_REQUESTED_MESSAGE,
    }))
}

/// POST /api/v1/auth/reset-password
pub async fn reset_password(
    State(state): State<AppState>,
    Json(req): Json<ResetPasswordRequest>,
) -> ApiResult<Json<MessageResponse>> {
    state
        .auth
        .reset_password(&req.token, &req.new_password)
        .await?;
    Ok(Json(MessageResponse {
        message: "Password has been reset successfully",
    }))
}

/// POST /api/v1/auth/change-password
pub async fn change_password(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<ChangePasswordRequest>,
) -> ApiResult<Json<MessageResponse>> {
    state
        .auth
        .change_password(user.id, &req.current_password, &req.new_password)
        .await?;
    Ok(Json(MessageResponse {
        message: "Password changed successfully",
    }))
}
