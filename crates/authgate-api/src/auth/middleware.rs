//! Request authentication gate
//!
//! Runs on every request. When a bearer token resolves to an account with a
//! live session and a valid signature, an `AuthenticatedUser` is added to the
//! request extensions. The gate never rejects a request itself: handlers that
//! need a principal take `AuthenticatedUser` as an extractor, which answers
//! 401 when none was attached.

use crate::audit::{audit_log, extract_ip_address, AuditEvent};
use crate::state::AppState;
use authgate_core::{AccountId, Role};
use axum::{
    async_trait,
    body::Body,
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

const BEARER_PREFIX: &str = "Bearer ";

/// Strip the `Bearer ` scheme from an Authorization header value
///
/// Any other scheme, or no header at all, counts as absent.
pub fn bearer_token(authorization: Option<&str>) -> Option<&str> {
    authorization?.strip_prefix(BEARER_PREFIX)
}

/// Principal attached by the gate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    pub account_id: AccountId,
    pub identity: String,
    pub role: Role,
}

/// Rejections produced when a handler requires a principal
#[derive(Debug, Error)]
pub enum GateRejection {
    #[error("Authentication required")]
    Unauthenticated,
}

impl IntoResponse for GateRejection {
    fn into_response(self) -> Response {
        let status = match self {
            GateRejection::Unauthenticated => StatusCode::UNAUTHORIZED,
        };

        let body = serde_json::json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = GateRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or(GateRejection::Unauthenticated)
    }
}

/// Session gate middleware
///
/// ```ignore
/// let app = Router::new()
///     .route("/api/v1/account/me", get(me_handler))
///     .layer(middleware::from_fn_with_state(state.clone(), session_gate))
///     .with_state(state);
/// ```
pub async fn session_gate(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    if state.is_public_path(request.uri().path()) {
        return next.run(request).await;
    }

    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| bearer_token(Some(value)))
        .map(str::to_string);

    let Some(token) = token else {
        return next.run(request).await;
    };

    if request.extensions().get::<AuthenticatedUser>().is_none() {
        match state.auth.authenticate(&token).await {
            Ok(user) => {
                tracing::debug!(account_id = user.account_id, "Session gate attached principal");
                request.extensions_mut().insert(user);
            }
            Err(skip) => {
                audit_log(&AuditEvent::SessionRejected {
                    reason: skip.as_str().to_string(),
                    path: request.uri().path().to_string(),
                    ip_address: extract_ip_address(request.headers()),
                });
            }
        }
    }

    next.run(request).await
}
