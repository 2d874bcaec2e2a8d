//! Authentication API handlers
//!
//! Registration, login, refresh, logout and password reset. These routes sit
//! under the gate's excluded prefix; refresh and logout read the bearer
//! header themselves.
//!
//! Author: hephaex@gmail.com

use crate::auth::{
    ForgotPasswordRequest, LoginEnvelope, LoginRequest, MessageResponse, RefreshResponse,
    RegisterRequest, ResetPasswordRequest, TokenPair,
};
use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;

fn authorization(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
}

/// Register a new account
///
/// The account starts unconfirmed with the preventive technician role. A
/// token pair is issued immediately, but login is refused until the account
/// is confirmed.
///
/// # Responses
///
/// * `201 Created` - Account registered, token pair returned
/// * `400 Bad Request` - Malformed identity or empty password
/// * `409 Conflict` - Identity already registered
#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    tag = "auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account registered", body = TokenPair),
        (status = 400, description = "Invalid input", body = crate::error::ApiError),
        (status = 409, description = "Identity already registered", body = crate::error::ApiError),
        (status = 500, description = "Internal server error", body = crate::error::ApiError),
    )
)]
pub async fn register_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let pair = state.auth.register(request).await?;
    Ok((StatusCode::CREATED, Json(pair)))
}

/// Login with identity and password
///
/// Refusals (unconfirmed account, wrong password) are reported in the
/// envelope's `error` field with status 200.
///
/// # Responses
///
/// * `200 OK` - Login envelope, tokens or error message
/// * `404 Not Found` - Unknown identity
#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login envelope", body = LoginEnvelope),
        (status = 404, description = "Unknown identity", body = crate::error::ApiError),
        (status = 500, description = "Internal server error", body = crate::error::ApiError),
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginEnvelope>, AppError> {
    let outcome = state.auth.login(request).await?;
    Ok(Json(LoginEnvelope::from(outcome)))
}

/// Refresh access token
///
/// Exchanges the bearer refresh token for a new access token. The refresh
/// token is not rotated. Any failure yields an empty 200 response.
#[utoipa::path(
    post,
    path = "/api/v1/auth/refresh",
    tag = "auth",
    responses(
        (status = 200, description = "New access token, or empty body when refresh is not possible", body = RefreshResponse),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn refresh_handler(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    match state.auth.refresh(authorization(&headers)).await {
        Some(response) => Json(response).into_response(),
        None => StatusCode::OK.into_response(),
    }
}

/// Logout
///
/// The bearer header must carry the refresh token: that is the token the
/// session ledger holds. An access token is not on file, so presenting one
/// leaves the session open. Always 200; repeating the call is harmless.
#[utoipa::path(
    post,
    path = "/api/v1/auth/logout",
    tag = "auth",
    responses(
        (status = 200, description = "Session of the bearer refresh token ended (no-op for access or unknown tokens)", body = MessageResponse),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Json<MessageResponse> {
    if let Err(e) = state.auth.logout(authorization(&headers)).await {
        tracing::warn!(error = %e, "Logout could not update the session ledger");
    }

    Json(MessageResponse::new("Logged out"))
}

/// Request a password reset
///
/// Always 202 so callers cannot learn which identities exist. The reset
/// token goes to the configured notifier, never into the response.
#[utoipa::path(
    post,
    path = "/api/v1/auth/password/forgot",
    tag = "auth",
    request_body = ForgotPasswordRequest,
    responses(
        (status = 202, description = "Reset requested", body = MessageResponse),
        (status = 500, description = "Internal server error", body = crate::error::ApiError),
    )
)]
pub async fn forgot_password_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ForgotPasswordRequest>,
) -> Result<impl IntoResponse, AppError> {
    state.auth.request_password_reset(&request.identity).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(MessageResponse::new(
            "If the account exists, a reset link has been sent",
        )),
    ))
}

/// Complete a password reset
///
/// Every session of the account is invalidated.
#[utoipa::path(
    post,
    path = "/api/v1/auth/password/reset",
    tag = "auth",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password reset", body = MessageResponse),
        (status = 400, description = "Invalid input", body = crate::error::ApiError),
        (status = 401, description = "Invalid or expired reset token", body = crate::error::ApiError),
    )
)]
pub async fn reset_password_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    state
        .auth
        .reset_password(&request.token, &request.new_password)
        .await?;

    Ok(Json(MessageResponse::new("Password has been reset")))
}
