//! Authentication and session lifecycle
//!
//! This module provides JWT-based authentication with the following components:
//! - Token issuance and validation
//! - Password hashing with Argon2
//! - The session gate middleware and `AuthenticatedUser` extractor
//! - The authentication service (register, login, refresh, logout, reset)
//! - Request and response models

pub mod jwt;
pub mod middleware;
pub mod models;
pub mod password;
pub mod service;

pub use jwt::{Claims, ExtraClaims, JwtError, TokenCodec, TokenUse};
pub use middleware::{bearer_token, session_gate, AuthenticatedUser, GateRejection};
pub use models::{
    AccountProfile, ForgotPasswordRequest, LoginEnvelope, LoginOutcome, LoginRequest,
    LoginSuccess, MessageResponse, PasswordUpdateRequest, RefreshResponse, RegisterRequest,
    RejectReason, ResetPasswordRequest, TokenPair,
};
pub use password::{Argon2PasswordEncoder, PasswordError};
pub use service::{AuthService, GateSkip, LoggingResetNotifier, ResetNotifier};
