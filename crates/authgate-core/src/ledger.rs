//! Session token ledger
//!
//! Durable record of every refresh token issued at login or registration.
//! Records are never deleted; they only move from active to revoked/expired.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AccountId, Result};

/// Kind of token held by a ledger record
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TokenKind {
    #[default]
    Bearer,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Bearer => "BEARER",
        }
    }
}

/// One issued session token and its validity flags
///
/// Both flags are monotonic: once true they never go back to false.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionToken {
    pub id: i64,
    pub account_id: AccountId,
    pub token: String,
    pub kind: TokenKind,
    pub revoked: bool,
    pub expired: bool,
    pub created_at: DateTime<Utc>,
}

impl SessionToken {
    /// A record can authenticate only while neither flag is set
    pub fn is_active(&self) -> bool {
        !self.revoked && !self.expired
    }

    /// Set both flags
    pub fn invalidate(&mut self) {
        self.revoked = true;
        self.expired = true;
    }
}

/// Storage for session token records
///
/// Implementations must keep at most one active record per account:
/// `record` supersedes every prior active record of the account in the same
/// atomic step that inserts the new one.
#[async_trait]
pub trait TokenLedger: Send + Sync {
    /// Insert a new active record and invalidate the account's other active records
    async fn record(&self, account_id: AccountId, token: &str) -> Result<SessionToken>;

    /// Look up a record by its literal token string
    async fn find_by_token(&self, token: &str) -> Result<Option<SessionToken>>;

    /// Invalidate every active record of an account, returning how many changed
    async fn invalidate_all_for_account(&self, account_id: AccountId) -> Result<u64>;

    /// Invalidate the record holding `token`; returns false when no such record exists
    async fn invalidate(&self, token: &str) -> Result<bool>;

    /// Whether the account currently has an active record
    async fn has_active_session(&self, account_id: AccountId) -> Result<bool>;

    /// All records of an account, oldest first
    async fn list_for_account(&self, account_id: AccountId) -> Result<Vec<SessionToken>>;
}
