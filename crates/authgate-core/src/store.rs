//! Credential store and password encoder seams
//!
//! Both are collaborators of the authentication service: the service reads and
//! saves accounts through `CredentialStore`, and never compares plaintext
//! passwords itself, only through `PasswordEncoder`.

use async_trait::async_trait;

use crate::{Account, AccountId, Result};

/// Account persistence
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Find an account by identity (case-insensitive)
    async fn find_by_identity(&self, identity: &str) -> Result<Option<Account>>;

    /// Find an account by id
    async fn find_by_id(&self, id: AccountId) -> Result<Option<Account>>;

    /// Whether an account with this identity exists (case-insensitive)
    async fn exists_by_identity(&self, identity: &str) -> Result<bool>;

    /// Insert (`id == 0`) or update an account, returning the stored copy
    ///
    /// Inserting an identity that already exists fails with `DuplicateAccount`.
    async fn save(&self, account: Account) -> Result<Account>;

    /// Find the account holding a password reset token
    async fn find_by_reset_token(&self, token: &str) -> Result<Option<Account>>;
}

/// One-way password hashing
pub trait PasswordEncoder: Send + Sync {
    /// Hash a plaintext password into a self-describing digest
    fn hash(&self, plaintext: &str) -> Result<String>;

    /// Check a plaintext password against a digest; malformed digests never match
    fn matches(&self, plaintext: &str, digest: &str) -> bool;
}
