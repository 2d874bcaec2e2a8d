//! PostgreSQL credential store and token ledger
//!
//! Both traits are implemented by one `PgStore` so that accounts and their
//! session tokens live in the same database and share a pool.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::FromRow;

use crate::account::normalize_identity;
use crate::{
    Account, AccountId, AuthError, CredentialStore, Result, Role, SessionToken, TokenKind,
    TokenLedger,
};

const ACCOUNT_COLUMNS: &str = "id, identity, password_hash, first_name, last_name, role, \
     confirmed, reset_token, reset_token_expires_at, created_at, updated_at";

const TOKEN_COLUMNS: &str = "id, account_id, token, kind, revoked, expired, created_at";

/// PostgreSQL-backed account and session storage
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect and apply the schema
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| AuthError::Storage(format!("PostgreSQL connection failed: {e}")))?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Apply the bundled schema (idempotent)
    pub async fn migrate(&self) -> Result<()> {
        let migration_sql = include_str!("../migrations/001_initial_schema.sql");
        sqlx::raw_sql(migration_sql).execute(&self.pool).await?;
        Ok(())
    }
}

/// Account row from database
#[derive(Debug, FromRow)]
struct AccountRow {
    id: i64,
    identity: String,
    password_hash: String,
    first_name: String,
    last_name: String,
    role: String,
    confirmed: bool,
    reset_token: Option<String>,
    reset_token_expires_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<AccountRow> for Account {
    fn from(row: AccountRow) -> Self {
        let role = Role::parse(&row.role).unwrap_or_else(|| {
            tracing::warn!(account_id = row.id, role = %row.role, "unknown role on file");
            Role::default()
        });

        Account {
            id: row.id,
            identity: row.identity,
            password_hash: row.password_hash,
            first_name: row.first_name,
            last_name: row.last_name,
            role,
            confirmed: row.confirmed,
            reset_token: row.reset_token,
            reset_token_expires_at: row.reset_token_expires_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Session token row from database
#[derive(Debug, FromRow)]
struct SessionTokenRow {
    id: i64,
    account_id: i64,
    token: String,
    kind: String,
    revoked: bool,
    expired: bool,
    created_at: DateTime<Utc>,
}

impl From<SessionTokenRow> for SessionToken {
    fn from(row: SessionTokenRow) -> Self {
        let kind = match row.kind.as_str() {
            "BEARER" => TokenKind::Bearer,
            other => {
                tracing::warn!(token_id = row.id, kind = other, "unknown token kind on file");
                TokenKind::Bearer
            }
        };

        SessionToken {
            id: row.id,
            account_id: row.account_id,
            token: row.token,
            kind,
            revoked: row.revoked,
            expired: row.expired,
            created_at: row.created_at,
        }
    }
}

fn map_unique_violation(err: sqlx::Error, identity: &str) -> AuthError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            AuthError::DuplicateAccount(identity.to_string())
        }
        _ => AuthError::Storage(err.to_string()),
    }
}

#[async_trait]
impl CredentialStore for PgStore {
    async fn find_by_identity(&self, identity: &str) -> Result<Option<Account>> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE LOWER(identity) = $1"
        ))
        .bind(normalize_identity(identity))
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn find_by_id(&self, id: AccountId) -> Result<Option<Account>> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn exists_by_identity(&self, identity: &str) -> Result<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM accounts WHERE LOWER(identity) = $1)",
        )
        .bind(normalize_identity(identity))
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn save(&self, account: Account) -> Result<Account> {
        let identity = normalize_identity(&account.identity);

        let row = if account.id == 0 {
            sqlx::query_as::<_, AccountRow>(&format!(
                r#"
                INSERT INTO accounts (identity, password_hash, first_name, last_name, role,
                                      confirmed, reset_token, reset_token_expires_at,
                                      created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, NOW())
                RETURNING {ACCOUNT_COLUMNS}
                "#
            ))
            .bind(&identity)
            .bind(&account.password_hash)
            .bind(&account.first_name)
            .bind(&account.last_name)
            .bind(account.role.as_str())
            .bind(account.confirmed)
            .bind(&account.reset_token)
            .bind(account.reset_token_expires_at)
            .bind(account.created_at)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_unique_violation(e, &identity))?
        } else {
            sqlx::query_as::<_, AccountRow>(&format!(
                r#"
                UPDATE accounts SET
                    identity = $2,
                    password_hash = $3,
                    first_name = $4,
                    last_name = $5,
                    role = $6,
                    confirmed = $7,
                    reset_token = $8,
                    reset_token_expires_at = $9,
                    updated_at = NOW()
                WHERE id = $1
                RETURNING {ACCOUNT_COLUMNS}
                "#
            ))
            .bind(account.id)
            .bind(&identity)
            .bind(&account.password_hash)
            .bind(&account.first_name)
            .bind(&account.last_name)
            .bind(account.role.as_str())
            .bind(account.confirmed)
            .bind(&account.reset_token)
            .bind(account.reset_token_expires_at)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_unique_violation(e, &identity))?
            .ok_or_else(|| AuthError::NotFound(format!("account {}", account.id)))?
        };

        Ok(row.into())
    }

    async fn find_by_reset_token(&self, token: &str) -> Result<Option<Account>> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE reset_token = $1"
        ))
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }
}

#[async_trait]
impl TokenLedger for PgStore {
    async fn record(&self, account_id: AccountId, token: &str) -> Result<SessionToken> {
        let mut tx = self.pool.begin().await?;

        // Serialises concurrent logins of the same account until commit
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(account_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            "UPDATE session_tokens SET revoked = TRUE, expired = TRUE \
             WHERE account_id = $1 AND NOT revoked AND NOT expired",
        )
        .bind(account_id)
        .execute(&mut *tx)
        .await?;

        let row = sqlx::query_as::<_, SessionTokenRow>(&format!(
            "INSERT INTO session_tokens (account_id, token, kind, revoked, expired, created_at) \
             VALUES ($1, $2, $3, FALSE, FALSE, NOW()) RETURNING {TOKEN_COLUMNS}"
        ))
        .bind(account_id)
        .bind(token)
        .bind(TokenKind::Bearer.as_str())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(row.into())
    }

    async fn find_by_token(&self, token: &str) -> Result<Option<SessionToken>> {
        let row = sqlx::query_as::<_, SessionTokenRow>(&format!(
            "SELECT {TOKEN_COLUMNS} FROM session_tokens WHERE token = $1"
        ))
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn invalidate_all_for_account(&self, account_id: AccountId) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE session_tokens SET revoked = TRUE, expired = TRUE \
             WHERE account_id = $1 AND NOT revoked AND NOT expired",
        )
        .bind(account_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn invalidate(&self, token: &str) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE session_tokens SET revoked = TRUE, expired = TRUE WHERE token = $1",
        )
        .bind(token)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn has_active_session(&self, account_id: AccountId) -> Result<bool> {
        let active = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM session_tokens \
             WHERE account_id = $1 AND NOT revoked AND NOT expired)",
        )
        .bind(account_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(active)
    }

    async fn list_for_account(&self, account_id: AccountId) -> Result<Vec<SessionToken>> {
        let rows = sqlx::query_as::<_, SessionTokenRow>(&format!(
            "SELECT {TOKEN_COLUMNS} FROM session_tokens WHERE account_id = $1 ORDER BY id"
        ))
        .bind(account_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}
