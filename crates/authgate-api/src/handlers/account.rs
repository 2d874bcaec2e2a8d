//! Account handlers for the authenticated principal
//!
//! Author: hephaex@gmail.com

use crate::auth::{AccountProfile, AuthenticatedUser, PasswordUpdateRequest};
use crate::error::AppError;
use crate::state::AppState;
use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

/// Change the password of the authenticated account
///
/// Existing sessions stay valid.
#[utoipa::path(
    put,
    path = "/api/v1/account/password",
    tag = "account",
    request_body = PasswordUpdateRequest,
    responses(
        (status = 204, description = "Password changed"),
        (status = 400, description = "Invalid input", body = crate::error::ApiError),
        (status = 401, description = "Unauthenticated or current password incorrect", body = crate::error::ApiError),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn update_password_handler(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Json(request): Json<PasswordUpdateRequest>,
) -> Result<StatusCode, AppError> {
    state
        .auth
        .update_password(
            user.account_id,
            &request.current_password,
            &request.new_password,
        )
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Get the authenticated account's profile
#[utoipa::path(
    get,
    path = "/api/v1/account/me",
    tag = "account",
    responses(
        (status = 200, description = "Current account", body = AccountProfile),
        (status = 401, description = "Unauthenticated"),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn me_handler(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
) -> Result<Json<AccountProfile>, AppError> {
    let account = state.auth.profile(user.account_id).await?;
    Ok(Json(AccountProfile::from(account)))
}
