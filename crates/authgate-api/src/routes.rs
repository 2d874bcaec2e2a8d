//! API route definitions
//!
//! Author: hephaex@gmail.com

use crate::handlers::{account, auth};
use crate::state::AppState;
use axum::{
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;

/// Create API v1 routes
pub fn api_routes() -> Router<Arc<AppState>> {
    // Token issuance and reset (skipped by the session gate)
    let auth_routes = Router::new()
        .route("/auth/register", post(auth::register_handler))
        .route("/auth/login", post(auth::login_handler))
        .route("/auth/refresh", post(auth::refresh_handler))
        .route("/auth/logout", post(auth::logout_handler))
        .route("/auth/password/forgot", post(auth::forgot_password_handler))
        .route("/auth/password/reset", post(auth::reset_password_handler));

    // Principal required (AuthenticatedUser extractor)
    let account_routes = Router::new()
        .route("/account/me", get(account::me_handler))
        .route("/account/password", put(account::update_password_handler));

    Router::new().merge(auth_routes).merge(account_routes)
}
