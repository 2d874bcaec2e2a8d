//! In-memory credential store and token ledger
//!
//! Used by the test router and by the server when no `DATABASE_URL` is set.
//! Each structure is guarded by a single tokio lock, so every trait method is
//! atomic with respect to the others.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::{Mutex, RwLock};

use crate::account::normalize_identity;
use crate::{
    Account, AccountId, AuthError, CredentialStore, Result, SessionToken, TokenKind, TokenLedger,
};

#[derive(Default)]
struct AccountTable {
    next_id: AccountId,
    rows: HashMap<AccountId, Account>,
}

/// In-memory `CredentialStore`
#[derive(Default)]
pub struct MemoryCredentialStore {
    table: RwLock<AccountTable>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored accounts
    pub async fn len(&self) -> usize {
        self.table.read().await.rows.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn find_by_identity(&self, identity: &str) -> Result<Option<Account>> {
        let identity = normalize_identity(identity);
        let table = self.table.read().await;
        Ok(table
            .rows
            .values()
            .find(|a| a.identity == identity)
            .cloned())
    }

    async fn find_by_id(&self, id: AccountId) -> Result<Option<Account>> {
        Ok(self.table.read().await.rows.get(&id).cloned())
    }

    async fn exists_by_identity(&self, identity: &str) -> Result<bool> {
        Ok(self.find_by_identity(identity).await?.is_some())
    }

    async fn save(&self, mut account: Account) -> Result<Account> {
        account.identity = normalize_identity(&account.identity);
        account.updated_at = Utc::now();

        let mut table = self.table.write().await;
        let clash = table
            .rows
            .values()
            .any(|a| a.identity == account.identity && a.id != account.id);
        if clash {
            return Err(AuthError::DuplicateAccount(account.identity));
        }

        if account.id == 0 {
            table.next_id += 1;
            account.id = table.next_id;
        } else if !table.rows.contains_key(&account.id) {
            return Err(AuthError::NotFound(format!("account {}", account.id)));
        }

        table.rows.insert(account.id, account.clone());
        Ok(account)
    }

    async fn find_by_reset_token(&self, token: &str) -> Result<Option<Account>> {
        let table = self.table.read().await;
        Ok(table
            .rows
            .values()
            .find(|a| a.reset_token.as_deref() == Some(token))
            .cloned())
    }
}

#[derive(Default)]
struct LedgerTable {
    next_id: i64,
    rows: Vec<SessionToken>,
}

/// In-memory `TokenLedger`
#[derive(Default)]
pub struct MemoryTokenLedger {
    table: Mutex<LedgerTable>,
}

impl MemoryTokenLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

fn invalidate_active(rows: &mut [SessionToken], account_id: AccountId) -> u64 {
    let mut touched = 0;
    for row in rows
        .iter_mut()
        .filter(|r| r.account_id == account_id && r.is_active())
    {
        row.invalidate();
        touched += 1;
    }
    touched
}

#[async_trait]
impl TokenLedger for MemoryTokenLedger {
    async fn record(&self, account_id: AccountId, token: &str) -> Result<SessionToken> {
        let mut table = self.table.lock().await;
        invalidate_active(&mut table.rows, account_id);

        table.next_id += 1;
        let record = SessionToken {
            id: table.next_id,
            account_id,
            token: token.to_string(),
            kind: TokenKind::Bearer,
            revoked: false,
            expired: false,
            created_at: Utc::now(),
        };
        table.rows.push(record.clone());
        Ok(record)
    }

    async fn find_by_token(&self, token: &str) -> Result<Option<SessionToken>> {
        let table = self.table.lock().await;
        Ok(table.rows.iter().find(|r| r.token == token).cloned())
    }

    async fn invalidate_all_for_account(&self, account_id: AccountId) -> Result<u64> {
        let mut table = self.table.lock().await;
        Ok(invalidate_active(&mut table.rows, account_id))
    }

    async fn invalidate(&self, token: &str) -> Result<bool> {
        let mut table = self.table.lock().await;
        match table.rows.iter_mut().find(|r| r.token == token) {
            Some(row) => {
                row.invalidate();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn has_active_session(&self, account_id: AccountId) -> Result<bool> {
        let table = self.table.lock().await;
        Ok(table
            .rows
            .iter()
            .any(|r| r.account_id == account_id && r.is_active()))
    }

    async fn list_for_account(&self, account_id: AccountId) -> Result<Vec<SessionToken>> {
        let table = self.table.lock().await;
        Ok(table
            .rows
            .iter()
            .filter(|r| r.account_id == account_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Role;
    use futures::future::join_all;
    use std::sync::Arc;

    fn account(identity: &str) -> Account {
        Account::new(
            identity,
            "hash".to_string(),
            "Test".to_string(),
            "User".to_string(),
            Role::Storekeeper,
        )
    }

    #[tokio::test]
    async fn test_save_assigns_ids_and_normalizes() {
        let store = MemoryCredentialStore::new();
        let a = store.save(account("A@X.com")).await.unwrap();
        let b = store.save(account("b@x.com")).await.unwrap();

        assert_eq!(a.id, 1);
        assert_eq!(b.id, 2);
        assert_eq!(a.identity, "a@x.com");
        assert!(store.exists_by_identity("a@X.COM").await.unwrap());
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_duplicate_identity_rejected() {
        let store = MemoryCredentialStore::new();
        store.save(account("a@x.com")).await.unwrap();

        let err = store.save(account("A@x.com")).await.unwrap_err();
        assert!(matches!(err, AuthError::DuplicateAccount(_)));
    }

    #[tokio::test]
    async fn test_update_existing_account() {
        let store = MemoryCredentialStore::new();
        let mut saved = store.save(account("a@x.com")).await.unwrap();
        saved.confirmed = true;
        store.save(saved.clone()).await.unwrap();

        let found = store.find_by_id(saved.id).await.unwrap().unwrap();
        assert!(found.confirmed);
    }

    #[tokio::test]
    async fn test_update_unknown_account_fails() {
        let store = MemoryCredentialStore::new();
        let mut ghost = account("ghost@x.com");
        ghost.id = 99;
        assert!(matches!(
            store.save(ghost).await,
            Err(AuthError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_find_by_reset_token() {
        let store = MemoryCredentialStore::new();
        let mut a = account("a@x.com");
        a.reset_token = Some("reset-123".to_string());
        let saved = store.save(a).await.unwrap();

        let found = store.find_by_reset_token("reset-123").await.unwrap();
        assert_eq!(found.map(|a| a.id), Some(saved.id));
        assert!(store.find_by_reset_token("other").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_record_supersedes_prior_session() {
        let ledger = MemoryTokenLedger::new();
        let first = ledger.record(1, "first").await.unwrap();
        assert!(first.is_active());

        ledger.record(1, "second").await.unwrap();

        let first = ledger.find_by_token("first").await.unwrap().unwrap();
        let second = ledger.find_by_token("second").await.unwrap().unwrap();
        assert!(first.revoked);
        assert!(second.is_active());
        assert_eq!(ledger.list_for_account(1).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_record_leaves_other_accounts_alone() {
        let ledger = MemoryTokenLedger::new();
        ledger.record(1, "one").await.unwrap();
        ledger.record(2, "two").await.unwrap();

        assert!(ledger.has_active_session(1).await.unwrap());
        assert!(ledger.has_active_session(2).await.unwrap());
    }

    #[tokio::test]
    async fn test_invalidate_is_idempotent() {
        let ledger = MemoryTokenLedger::new();
        ledger.record(1, "tok").await.unwrap();

        assert!(ledger.invalidate("tok").await.unwrap());
        let once = ledger.find_by_token("tok").await.unwrap().unwrap();
        assert!(ledger.invalidate("tok").await.unwrap());
        let twice = ledger.find_by_token("tok").await.unwrap().unwrap();

        assert_eq!(
            (once.revoked, once.expired),
            (twice.revoked, twice.expired)
        );
        assert!(twice.revoked && twice.expired);
        assert!(!ledger.invalidate("missing").await.unwrap());
    }

    #[tokio::test]
    async fn test_invalidate_all_for_account() {
        let ledger = MemoryTokenLedger::new();
        ledger.record(1, "tok").await.unwrap();

        assert_eq!(ledger.invalidate_all_for_account(1).await.unwrap(), 1);
        assert_eq!(ledger.invalidate_all_for_account(1).await.unwrap(), 0);
        assert!(!ledger.has_active_session(1).await.unwrap());
    }

    #[tokio::test]
    async fn test_concurrent_logins_leave_one_active_record() {
        let ledger = Arc::new(MemoryTokenLedger::new());
        let handles = (0..32).map(|i| {
            let ledger = Arc::clone(&ledger);
            tokio::spawn(async move {
                ledger.record(7, &format!("token-{i}")).await.unwrap();
            })
        });
        for joined in join_all(handles).await {
            joined.unwrap();
        }

        let records = ledger.list_for_account(7).await.unwrap();
        assert_eq!(records.len(), 32);
        assert_eq!(records.iter().filter(|r| r.is_active()).count(), 1);
    }
}
