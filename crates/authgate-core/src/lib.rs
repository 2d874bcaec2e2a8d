//! authgate Core - Domain models, storage traits, and shared types
//!
//! This crate defines the abstractions the authentication service is built on:
//! - Accounts, roles and session token records
//! - The credential store and token ledger traits
//! - In-memory and PostgreSQL implementations of both
//! - The password encoder seam
//! - Common error types
//! - Configuration management

pub mod account;
pub mod config;
pub mod ledger;
pub mod memory;
pub mod postgres;
pub mod store;

pub use account::{Account, AccountId, Role};
pub use config::{
    AppConfig, ConfigError, DatabaseConfig, JwtConfig, LoggingConfig, PasswordConfig,
    ServerConfig, MAX_LIFETIME_SECS,
};
pub use ledger::{SessionToken, TokenKind, TokenLedger};
pub use memory::{MemoryCredentialStore, MemoryTokenLedger};
pub use postgres::PgStore;
pub use store::{CredentialStore, PasswordEncoder};

use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Core error types for authentication operations
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Account already exists: {0}")]
    DuplicateAccount(String),

    #[error("{0}")]
    Credential(String),

    #[error("Account not confirmed: {0}")]
    UnconfirmedAccount(String),

    #[error("Token encoding failed: {0}")]
    Encoding(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<sqlx::Error> for AuthError {
    fn from(err: sqlx::Error) -> Self {
        AuthError::Storage(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AuthError>;
