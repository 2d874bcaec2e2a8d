//! authgate API - token authentication and session lifecycle over HTTP
//!
//! Provides the session gate middleware and the REST endpoints for
//! registration, login, refresh, logout and password management.

pub mod audit;
pub mod auth;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

use crate::auth::session_gate;
use crate::handlers::health;
use crate::state::AppState;
use axum::{middleware, routing::get, Router};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

/// OpenAPI document
#[derive(OpenApi)]
#[openapi(
    info(title = "authgate", description = "Token authentication and session lifecycle API"),
    paths(
        handlers::health::health_check,
        handlers::health::readiness_check,
        handlers::auth::register_handler,
        handlers::auth::login_handler,
        handlers::auth::refresh_handler,
        handlers::auth::logout_handler,
        handlers::auth::forgot_password_handler,
        handlers::auth::reset_password_handler,
        handlers::account::update_password_handler,
        handlers::account::me_handler,
    ),
    components(schemas(
        auth::RegisterRequest,
        auth::LoginRequest,
        auth::PasswordUpdateRequest,
        auth::ForgotPasswordRequest,
        auth::ResetPasswordRequest,
        auth::TokenPair,
        auth::RefreshResponse,
        auth::LoginEnvelope,
        auth::MessageResponse,
        auth::AccountProfile,
        error::ApiError,
        health::HealthResponse,
        health::ReadinessResponse,
    )),
    modifiers(&BearerAuth),
    tags(
        (name = "health", description = "Liveness and readiness checks"),
        (name = "auth", description = "Token issuance, refresh, logout and password reset"),
        (name = "account", description = "Operations on the authenticated account"),
    )
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Build the application router around shared state
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        .nest("/api/v1", routes::api_routes())
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(middleware::from_fn_with_state(state.clone(), session_gate))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Router over fresh in-memory state with a fixed secret
pub fn create_router_for_testing() -> Router {
    create_router(Arc::new(AppState::for_testing()))
}
