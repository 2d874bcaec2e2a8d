//! Authentication service layer
//!
//! Registration, login, refresh, logout, password change and password reset.
//! The service owns no storage of its own: accounts live in a
//! `CredentialStore`, issued refresh tokens in a `TokenLedger`.

use super::jwt::{TokenCodec, TokenUse};
use super::middleware::{bearer_token, AuthenticatedUser};
use super::models::{
    LoginOutcome, LoginRequest, LoginSuccess, RefreshResponse, RegisterRequest, RejectReason,
    TokenPair,
};
use crate::audit::{audit_log, AuditEvent};
use async_trait::async_trait;
use authgate_core::account::normalize_identity;
use authgate_core::{
    Account, AccountId, AuthError, CredentialStore, PasswordEncoder, Result, Role, TokenLedger,
};
use base64::Engine;
use chrono::{Duration, Utc};
use rand::Rng;
use std::sync::Arc;

/// Delivery channel for password reset tokens
#[async_trait]
pub trait ResetNotifier: Send + Sync {
    async fn notify(&self, account: &Account, token: &str);
}

/// Writes reset notifications to the log instead of sending them
#[derive(Debug, Default)]
pub struct LoggingResetNotifier;

#[async_trait]
impl ResetNotifier for LoggingResetNotifier {
    async fn notify(&self, account: &Account, token: &str) {
        tracing::info!(
            account_id = account.id,
            identity = %account.identity,
            expires_at = ?account.reset_token_expires_at,
            "Password reset token issued"
        );
        tracing::debug!(identity = %account.identity, token = %token, "Password reset token");
    }
}

/// Why the gate declined to attach a principal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateSkip {
    NoSubject,
    UnknownAccount,
    InactiveSession,
    InvalidToken,
    NotAccessToken,
    StorageUnavailable,
}

impl GateSkip {
    pub fn as_str(&self) -> &'static str {
        match self {
            GateSkip::NoSubject => "no subject",
            GateSkip::UnknownAccount => "unknown account",
            GateSkip::InactiveSession => "inactive session",
            GateSkip::InvalidToken => "invalid token",
            GateSkip::NotAccessToken => "not an access token",
            GateSkip::StorageUnavailable => "storage unavailable",
        }
    }
}

/// Authentication service
pub struct AuthService {
    accounts: Arc<dyn CredentialStore>,
    ledger: Arc<dyn TokenLedger>,
    encoder: Arc<dyn PasswordEncoder>,
    codec: TokenCodec,
    notifier: Arc<dyn ResetNotifier>,
    reset_ttl: std::time::Duration,
}

impl AuthService {
    /// Create a new authentication service
    pub fn new(
        accounts: Arc<dyn CredentialStore>,
        ledger: Arc<dyn TokenLedger>,
        encoder: Arc<dyn PasswordEncoder>,
        codec: TokenCodec,
        reset_ttl: std::time::Duration,
    ) -> Self {
        Self {
            accounts,
            ledger,
            encoder,
            codec,
            notifier: Arc::new(LoggingResetNotifier),
            reset_ttl,
        }
    }

    /// Replace the reset notifier
    pub fn with_notifier(mut self, notifier: Arc<dyn ResetNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    fn issue_pair(&self, account: &Account) -> Result<TokenPair> {
        Ok(TokenPair {
            access_token: self.codec.issue_access(account)?,
            refresh_token: self.codec.issue_refresh(account)?,
        })
    }

    /// Register a new, unconfirmed account and open its first session
    pub async fn register(&self, request: RegisterRequest) -> Result<TokenPair> {
        let identity = normalize_identity(&request.identity);
        if !identity.contains('@') {
            return Err(AuthError::Validation("Invalid identity format".to_string()));
        }
        if request.password.is_empty() {
            return Err(AuthError::Validation("Password must not be empty".to_string()));
        }

        if self.accounts.exists_by_identity(&identity).await? {
            audit_log(&AuditEvent::RegistrationFailure {
                identity: identity.clone(),
                reason: "Identity already registered".to_string(),
            });
            return Err(AuthError::DuplicateAccount(identity));
        }

        let password_hash = self.encoder.hash(&request.password)?;
        let account = self
            .accounts
            .save(Account::new(
                &identity,
                password_hash,
                request.first_name,
                request.last_name,
                Role::PreventiveTechnician,
            ))
            .await?;

        let pair = self.issue_pair(&account)?;
        self.ledger.record(account.id, &pair.refresh_token).await?;

        audit_log(&AuditEvent::RegistrationSuccess {
            account_id: account.id,
            identity: account.identity.clone(),
            role: account.role.to_string(),
        });

        Ok(pair)
    }

    /// Authenticate with identity and password
    ///
    /// Unknown identities are an error; unconfirmed accounts and wrong
    /// passwords are ordinary outcomes and leave the ledger untouched.
    pub async fn login(&self, request: LoginRequest) -> Result<LoginOutcome> {
        let account = self
            .accounts
            .find_by_identity(&request.identity)
            .await?
            .ok_or_else(|| AuthError::NotFound(format!("account {}", request.identity)))?;

        let rejection = if !account.confirmed {
            Some(RejectReason::NotConfirmed)
        } else if !self.encoder.matches(&request.password, &account.password_hash) {
            Some(RejectReason::InvalidCredentials)
        } else {
            None
        };

        if let Some(reason) = rejection {
            audit_log(&AuditEvent::LoginRejected {
                identity: account.identity,
                reason: reason.message().to_string(),
            });
            return Ok(LoginOutcome::Rejected(reason));
        }

        let pair = self.issue_pair(&account)?;
        self.ledger.record(account.id, &pair.refresh_token).await?;

        audit_log(&AuditEvent::LoginSuccess {
            account_id: account.id,
            identity: account.identity.clone(),
        });

        Ok(LoginOutcome::Success(LoginSuccess {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            account_id: account.id,
            role: account.role,
            identity: account.identity,
        }))
    }

    /// Whether `token` may authenticate `account_id`
    ///
    /// A token on file must itself be active. A token with no record (access
    /// tokens are never recorded) is accepted while the account has any
    /// active session.
    async fn session_allows(&self, account_id: AccountId, token: &str) -> Result<bool> {
        match self.ledger.find_by_token(token).await? {
            Some(record) => Ok(record.account_id == account_id && record.is_active()),
            None => self.ledger.has_active_session(account_id).await,
        }
    }

    /// Mint a new access token from a bearer refresh token
    ///
    /// Never fails: every problem, storage errors included, yields `None`.
    /// Access tokens are refused. The refresh token is returned unchanged.
    pub async fn refresh(&self, authorization: Option<&str>) -> Option<RefreshResponse> {
        let token = bearer_token(authorization)?;
        let identity = self.codec.extract_subject(token)?;

        match self.try_refresh(token, &identity).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(error = %e, "Token refresh failed");
                None
            }
        }
    }

    async fn try_refresh(&self, token: &str, identity: &str) -> Result<Option<RefreshResponse>> {
        let Some(account) = self.accounts.find_by_identity(identity).await? else {
            return Ok(None);
        };

        if !self.codec.verify(token, &account.identity) {
            return Ok(None);
        }
        match self.codec.decode(token) {
            Ok(claims) if claims.token_use == TokenUse::Refresh => {}
            _ => return Ok(None),
        }
        if !self.session_allows(account.id, token).await? {
            return Ok(None);
        }

        let access_token = self.codec.issue_access(&account)?;

        audit_log(&AuditEvent::TokenRefresh {
            account_id: account.id,
            identity: account.identity,
        });

        Ok(Some(RefreshResponse {
            access_token,
            refresh_token: token.to_string(),
        }))
    }

    /// Change the password of an authenticated account
    ///
    /// Existing sessions are left alone.
    pub async fn update_password(
        &self,
        account_id: AccountId,
        current_password: &str,
        new_password: &str,
    ) -> Result<()> {
        let mut account = self
            .accounts
            .find_by_id(account_id)
            .await?
            .ok_or_else(|| AuthError::NotFound(format!("account {account_id}")))?;

        if !self.encoder.matches(current_password, &account.password_hash) {
            return Err(AuthError::Credential(
                "Current password is incorrect".to_string(),
            ));
        }
        if new_password.is_empty() {
            return Err(AuthError::Validation("Password must not be empty".to_string()));
        }

        account.password_hash = self.encoder.hash(new_password)?;
        self.accounts.save(account).await?;

        audit_log(&AuditEvent::PasswordChange { account_id });
        Ok(())
    }

    /// Invalidate the refresh token carried by a bearer header
    ///
    /// Missing or malformed headers are a no-op, as is a token with no record
    /// (access tokens included).
    pub async fn logout(&self, authorization: Option<&str>) -> Result<()> {
        let Some(token) = bearer_token(authorization) else {
            return Ok(());
        };

        let record = self.ledger.find_by_token(token).await?;
        let found = self.ledger.invalidate(token).await?;

        audit_log(&AuditEvent::Logout {
            account_id: record.map(|r| r.account_id),
            found,
        });
        Ok(())
    }

    /// Resolve a bearer token to a principal
    ///
    /// Checks run cheapest-first; the signature is only verified once the
    /// account and its session are known. Refresh tokens never authenticate
    /// a request.
    pub async fn authenticate(
        &self,
        token: &str,
    ) -> std::result::Result<AuthenticatedUser, GateSkip> {
        let identity = self.codec.extract_subject(token).ok_or(GateSkip::NoSubject)?;

        let account = self
            .accounts
            .find_by_identity(&identity)
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "Credential lookup failed in session gate");
                GateSkip::StorageUnavailable
            })?
            .ok_or(GateSkip::UnknownAccount)?;

        let allowed = self
            .session_allows(account.id, token)
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "Ledger lookup failed in session gate");
                GateSkip::StorageUnavailable
            })?;
        if !allowed {
            return Err(GateSkip::InactiveSession);
        }

        if !self.codec.verify(token, &account.identity) {
            return Err(GateSkip::InvalidToken);
        }

        let claims = self
            .codec
            .decode(token)
            .map_err(|_| GateSkip::InvalidToken)?;
        if claims.token_use != TokenUse::Access {
            return Err(GateSkip::NotAccessToken);
        }

        let role = claims
            .role
            .as_deref()
            .and_then(Role::parse)
            .unwrap_or(account.role);

        Ok(AuthenticatedUser {
            account_id: account.id,
            identity: account.identity,
            role,
        })
    }

    /// Issue a password reset token for `identity`
    ///
    /// Returns `None` for unknown identities so callers cannot tell accounts
    /// apart. The token is also handed to the configured `ResetNotifier`.
    pub async fn request_password_reset(&self, identity: &str) -> Result<Option<String>> {
        let Some(mut account) = self.accounts.find_by_identity(identity).await? else {
            tracing::debug!(identity = %identity, "Password reset for unknown identity");
            return Ok(None);
        };

        let expires_at = Duration::from_std(self.reset_ttl)
            .ok()
            .and_then(|ttl| Utc::now().checked_add_signed(ttl))
            .ok_or_else(|| {
                AuthError::Validation("Password reset lifetime out of range".to_string())
            })?;

        let token = generate_reset_token();
        account.reset_token = Some(token.clone());
        account.reset_token_expires_at = Some(expires_at);
        let account = self.accounts.save(account).await?;

        audit_log(&AuditEvent::PasswordResetRequested {
            account_id: account.id,
            identity: account.identity.clone(),
        });
        self.notifier.notify(&account, &token).await;

        Ok(Some(token))
    }

    /// Replace the password using a reset token; ends every session
    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<()> {
        let invalid = || AuthError::Credential("Invalid or expired reset token".to_string());

        let mut account = self
            .accounts
            .find_by_reset_token(token)
            .await?
            .ok_or_else(invalid)?;
        if !account.is_reset_token_valid() {
            return Err(invalid());
        }
        if new_password.is_empty() {
            return Err(AuthError::Validation("Password must not be empty".to_string()));
        }

        account.password_hash = self.encoder.hash(new_password)?;
        account.clear_reset_token();
        let account = self.accounts.save(account).await?;

        let sessions_invalidated = self.ledger.invalidate_all_for_account(account.id).await?;

        audit_log(&AuditEvent::PasswordResetCompleted {
            account_id: account.id,
            sessions_invalidated,
        });
        Ok(())
    }

    /// Mark an account as confirmed
    pub async fn confirm_account(&self, account_id: AccountId) -> Result<Account> {
        let mut account = self
            .accounts
            .find_by_id(account_id)
            .await?
            .ok_or_else(|| AuthError::NotFound(format!("account {account_id}")))?;

        if !account.confirmed {
            account.confirmed = true;
            account = self.accounts.save(account).await?;
            audit_log(&AuditEvent::AccountConfirmed { account_id });
        }
        Ok(account)
    }

    /// Look up the account behind a principal
    pub async fn profile(&self, account_id: AccountId) -> Result<Account> {
        self.accounts
            .find_by_id(account_id)
            .await?
            .ok_or_else(|| AuthError::NotFound(format!("account {account_id}")))
    }
}

/// Generate a cryptographically secure reset token
fn generate_reset_token() -> String {
    let mut rng = rand::thread_rng();
    let token_bytes: [u8; 32] = rng.gen();
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(token_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::password::Argon2PasswordEncoder;
    use authgate_core::{JwtConfig, MemoryCredentialStore, MemoryTokenLedger, PasswordConfig};
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct CapturingNotifier {
        tokens: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ResetNotifier for CapturingNotifier {
        async fn notify(&self, _account: &Account, token: &str) {
            self.tokens.lock().await.push(token.to_string());
        }
    }

    struct Fixture {
        service: AuthService,
        accounts: Arc<MemoryCredentialStore>,
        ledger: Arc<MemoryTokenLedger>,
        notifier: Arc<CapturingNotifier>,
    }

    fn fixture() -> Fixture {
        let accounts = Arc::new(MemoryCredentialStore::new());
        let ledger = Arc::new(MemoryTokenLedger::new());
        let notifier = Arc::new(CapturingNotifier::default());
        let encoder = Argon2PasswordEncoder::new(&PasswordConfig {
            memory_cost: 1024,
            time_cost: 1,
            parallelism: 1,
            ..Default::default()
        })
        .unwrap();

        let service = AuthService::new(
            accounts.clone(),
            ledger.clone(),
            Arc::new(encoder),
            TokenCodec::new(&JwtConfig::default()),
            std::time::Duration::from_secs(3600),
        )
        .with_notifier(notifier.clone());

        Fixture {
            service,
            accounts,
            ledger,
            notifier,
        }
    }

    fn register_request(identity: &str) -> RegisterRequest {
        RegisterRequest {
            identity: identity.to_string(),
            password: "initial-pw".to_string(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
        }
    }

    fn login_request(identity: &str, password: &str) -> LoginRequest {
        LoginRequest {
            identity: identity.to_string(),
            password: password.to_string(),
        }
    }

    fn bearer(token: &str) -> String {
        format!("Bearer {token}")
    }

    async fn confirmed_account(f: &Fixture, identity: &str) -> Account {
        f.service.register(register_request(identity)).await.unwrap();
        let account = f.accounts.find_by_identity(identity).await.unwrap().unwrap();
        f.service.confirm_account(account.id).await.unwrap()
    }

    async fn login_ok(f: &Fixture, identity: &str, password: &str) -> LoginSuccess {
        match f.service.login(login_request(identity, password)).await.unwrap() {
            LoginOutcome::Success(success) => success,
            LoginOutcome::Rejected(reason) => panic!("login rejected: {reason:?}"),
        }
    }

    #[tokio::test]
    async fn test_register_creates_unconfirmed_account_with_session() {
        let f = fixture();
        let pair = f.service.register(register_request("New@Plant.example")).await.unwrap();

        let account = f
            .accounts
            .find_by_identity("new@plant.example")
            .await
            .unwrap()
            .unwrap();
        assert!(!account.confirmed);
        assert_eq!(account.role, Role::PreventiveTechnician);
        assert_ne!(account.password_hash, "initial-pw");

        let record = f.ledger.find_by_token(&pair.refresh_token).await.unwrap().unwrap();
        assert_eq!(record.account_id, account.id);
        assert!(record.is_active());
    }

    #[tokio::test]
    async fn test_register_duplicate_is_case_insensitive() {
        let f = fixture();
        f.service.register(register_request("a@plant.example")).await.unwrap();

        let err = f
            .service
            .register(register_request("A@PLANT.example"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::DuplicateAccount(_)));
        assert_eq!(f.accounts.len().await, 1);
    }

    #[tokio::test]
    async fn test_register_validates_input() {
        let f = fixture();
        let mut request = register_request("no-at-sign");
        assert!(matches!(
            f.service.register(request.clone()).await,
            Err(AuthError::Validation(_))
        ));

        request.identity = "ok@plant.example".to_string();
        request.password.clear();
        assert!(matches!(
            f.service.register(request).await,
            Err(AuthError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_login_unknown_identity_is_not_found() {
        let f = fixture();
        let err = f
            .service
            .login(login_request("ghost@plant.example", "pw"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_login_unconfirmed_is_rejected() {
        let f = fixture();
        f.service.register(register_request("a@plant.example")).await.unwrap();

        let outcome = f
            .service
            .login(login_request("a@plant.example", "initial-pw"))
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            LoginOutcome::Rejected(RejectReason::NotConfirmed)
        ));
    }

    #[tokio::test]
    async fn test_wrong_password_leaves_ledger_unchanged() {
        let f = fixture();
        let account = confirmed_account(&f, "a@plant.example").await;
        let before = f.ledger.list_for_account(account.id).await.unwrap();

        let outcome = f
            .service
            .login(login_request("a@plant.example", "wrong"))
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            LoginOutcome::Rejected(RejectReason::InvalidCredentials)
        ));

        let after = f.ledger.list_for_account(account.id).await.unwrap();
        assert_eq!(before.len(), after.len());
        assert_eq!(
            before.iter().filter(|r| r.is_active()).count(),
            after.iter().filter(|r| r.is_active()).count()
        );
    }

    #[tokio::test]
    async fn test_second_login_supersedes_first() {
        let f = fixture();
        let account = confirmed_account(&f, "a@plant.example").await;

        let first = login_ok(&f, "a@plant.example", "initial-pw").await;
        let second = login_ok(&f, "a@plant.example", "initial-pw").await;
        assert_eq!(first.account_id, account.id);

        let first_record = f
            .ledger
            .find_by_token(&first.refresh_token)
            .await
            .unwrap()
            .unwrap();
        let second_record = f
            .ledger
            .find_by_token(&second.refresh_token)
            .await
            .unwrap()
            .unwrap();
        assert!(first_record.revoked && first_record.expired);
        assert!(second_record.is_active());

        let records = f.ledger.list_for_account(account.id).await.unwrap();
        assert_eq!(records.iter().filter(|r| r.is_active()).count(), 1);
    }

    #[tokio::test]
    async fn test_refresh_returns_same_refresh_token() {
        let f = fixture();
        confirmed_account(&f, "a@plant.example").await;
        let session = login_ok(&f, "a@plant.example", "initial-pw").await;

        let response = f
            .service
            .refresh(Some(bearer(&session.refresh_token).as_str()))
            .await
            .unwrap();
        assert_eq!(response.refresh_token, session.refresh_token);
        assert!(f
            .service
            .codec()
            .verify(&response.access_token, "a@plant.example"));
    }

    #[tokio::test]
    async fn test_refresh_no_ops() {
        let f = fixture();
        confirmed_account(&f, "a@plant.example").await;
        let first = login_ok(&f, "a@plant.example", "initial-pw").await;
        login_ok(&f, "a@plant.example", "initial-pw").await;

        assert!(f.service.refresh(None).await.is_none());
        assert!(f.service.refresh(Some("Basic abc")).await.is_none());
        assert!(f.service.refresh(Some("Bearer garbage")).await.is_none());
        // superseded by the second login
        assert!(f
            .service
            .refresh(Some(bearer(&first.refresh_token).as_str()))
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_refresh_refuses_access_token() {
        let f = fixture();
        confirmed_account(&f, "a@plant.example").await;
        let session = login_ok(&f, "a@plant.example", "initial-pw").await;

        assert!(f
            .service
            .refresh(Some(bearer(&session.access_token).as_str()))
            .await
            .is_none());

        // a minted access token cannot be chained into another refresh
        let minted = f
            .service
            .refresh(Some(bearer(&session.refresh_token).as_str()))
            .await
            .unwrap();
        assert!(f
            .service
            .refresh(Some(bearer(&minted.access_token).as_str()))
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_password_reset_lifetime_out_of_range() {
        let accounts = Arc::new(MemoryCredentialStore::new());
        let service = AuthService::new(
            accounts.clone(),
            Arc::new(MemoryTokenLedger::new()),
            Arc::new(
                Argon2PasswordEncoder::new(&PasswordConfig {
                    memory_cost: 1024,
                    time_cost: 1,
                    parallelism: 1,
                    ..Default::default()
                })
                .unwrap(),
            ),
            TokenCodec::new(&JwtConfig::default()),
            std::time::Duration::from_secs(u64::MAX),
        );
        service.register(register_request("a@plant.example")).await.unwrap();

        assert!(matches!(
            service.request_password_reset("a@plant.example").await,
            Err(AuthError::Validation(_))
        ));
        let account = accounts
            .find_by_identity("a@plant.example")
            .await
            .unwrap()
            .unwrap();
        assert!(account.reset_token.is_none());
    }

    #[tokio::test]
    async fn test_refresh_rejects_foreign_signature() {
        let f = fixture();
        let account = confirmed_account(&f, "a@plant.example").await;
        login_ok(&f, "a@plant.example", "initial-pw").await;

        let forged = TokenCodec::new(&JwtConfig {
            secret: "attacker".to_string(),
            ..Default::default()
        })
        .issue_refresh(&account)
        .unwrap();
        assert!(f.service.refresh(Some(bearer(&forged).as_str())).await.is_none());
    }

    #[tokio::test]
    async fn test_update_password() {
        let f = fixture();
        let account = confirmed_account(&f, "a@plant.example").await;

        let err = f
            .service
            .update_password(account.id, "wrong", "next-pw")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Current password is incorrect");
        login_ok(&f, "a@plant.example", "initial-pw").await;

        f.service
            .update_password(account.id, "initial-pw", "next-pw")
            .await
            .unwrap();
        login_ok(&f, "a@plant.example", "next-pw").await;

        assert!(matches!(
            f.service.update_password(999, "x", "y").await,
            Err(AuthError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_logout_is_idempotent() {
        let f = fixture();
        confirmed_account(&f, "a@plant.example").await;
        let session = login_ok(&f, "a@plant.example", "initial-pw").await;
        let header = bearer(&session.refresh_token);

        f.service.logout(Some(header.as_str())).await.unwrap();
        let once = f
            .ledger
            .find_by_token(&session.refresh_token)
            .await
            .unwrap()
            .unwrap();
        f.service.logout(Some(header.as_str())).await.unwrap();
        let twice = f
            .ledger
            .find_by_token(&session.refresh_token)
            .await
            .unwrap()
            .unwrap();

        assert!(!once.is_active());
        assert_eq!((once.revoked, once.expired), (twice.revoked, twice.expired));

        f.service.logout(None).await.unwrap();
        f.service.logout(Some("Bearer ")).await.unwrap();
        f.service.logout(Some("Token abc")).await.unwrap();
    }

    #[tokio::test]
    async fn test_authenticate_follows_ledger() {
        let f = fixture();
        let account = confirmed_account(&f, "a@plant.example").await;
        let first = login_ok(&f, "a@plant.example", "initial-pw").await;

        let user = f.service.authenticate(&first.access_token).await.unwrap();
        assert_eq!(user.account_id, account.id);
        assert_eq!(user.role, Role::PreventiveTechnician);

        let second = login_ok(&f, "a@plant.example", "initial-pw").await;
        // revoked record blocks the token even though its signature is fine
        assert_eq!(
            f.service.authenticate(&first.refresh_token).await.unwrap_err(),
            GateSkip::InactiveSession
        );
        assert_eq!(
            f.service.authenticate(&second.refresh_token).await.unwrap_err(),
            GateSkip::NotAccessToken
        );
        assert!(f.service.authenticate(&second.access_token).await.is_ok());

        f.service
            .logout(Some(bearer(&second.refresh_token).as_str()))
            .await
            .unwrap();
        assert_eq!(
            f.service.authenticate(&second.access_token).await.unwrap_err(),
            GateSkip::InactiveSession
        );
        assert_eq!(
            f.service.authenticate("garbage").await.unwrap_err(),
            GateSkip::NoSubject
        );
    }

    #[tokio::test]
    async fn test_password_reset_flow() {
        let f = fixture();
        let account = confirmed_account(&f, "a@plant.example").await;
        let session = login_ok(&f, "a@plant.example", "initial-pw").await;

        assert!(f
            .service
            .request_password_reset("ghost@plant.example")
            .await
            .unwrap()
            .is_none());

        let token = f
            .service
            .request_password_reset("A@plant.example")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(*f.notifier.tokens.lock().await, vec![token.clone()]);

        f.service.reset_password(&token, "reset-pw").await.unwrap();

        let stored = f.accounts.find_by_id(account.id).await.unwrap().unwrap();
        assert!(stored.reset_token.is_none());
        assert!(stored.reset_token_expires_at.is_none());
        assert!(!f.ledger.has_active_session(account.id).await.unwrap());
        assert!(f
            .service
            .refresh(Some(bearer(&session.refresh_token).as_str()))
            .await
            .is_none());

        login_ok(&f, "a@plant.example", "reset-pw").await;

        let err = f.service.reset_password(&token, "again").await.unwrap_err();
        assert_eq!(err.to_string(), "Invalid or expired reset token");
    }

    #[tokio::test]
    async fn test_expired_reset_token_rejected() {
        let f = fixture();
        let account = confirmed_account(&f, "a@plant.example").await;

        let mut stored = f.accounts.find_by_id(account.id).await.unwrap().unwrap();
        stored.reset_token = Some("stale".to_string());
        stored.reset_token_expires_at = Some(Utc::now() - Duration::minutes(1));
        f.accounts.save(stored).await.unwrap();

        let err = f.service.reset_password("stale", "pw").await.unwrap_err();
        assert!(matches!(err, AuthError::Credential(_)));
        login_ok(&f, "a@plant.example", "initial-pw").await;
    }
}
