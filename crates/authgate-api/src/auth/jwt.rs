//! JWT token issuance and validation
//!
//! Implements HMAC-SHA256 signed access and refresh tokens. The codec holds
//! the signing secret injected at startup and is cheap to clone.

use authgate_core::{Account, AccountId, AuthError, JwtConfig};
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Which half of a token pair a token is
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenUse {
    #[default]
    Access,
    Refresh,
}

/// JWT Claims structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    /// Token issuer
    pub iss: String,
    /// Subject - account identity
    pub sub: String,
    /// JWT ID - unique per token so two tokens minted in the same second differ
    pub jti: String,
    /// Issued at timestamp (Unix epoch)
    pub iat: u64,
    /// Expiration timestamp (Unix epoch)
    pub exp: u64,
    /// Account role
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Account identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<AccountId>,
    #[serde(default)]
    pub token_use: TokenUse,
}

/// Claims supplied by the caller on top of the registered ones
#[derive(Debug, Clone, Default)]
pub struct ExtraClaims {
    pub role: Option<String>,
    pub account_id: Option<AccountId>,
    pub token_use: TokenUse,
}

impl ExtraClaims {
    fn for_account(account: &Account, token_use: TokenUse) -> Self {
        Self {
            role: Some(account.role.as_str().to_string()),
            account_id: Some(account.id),
            token_use,
        }
    }
}

/// JWT errors
#[derive(Debug, Error)]
pub enum JwtError {
    #[error("Failed to encode JWT: {0}")]
    EncodingError(#[from] jsonwebtoken::errors::Error),

    #[error("Invalid token format")]
    InvalidToken,

    #[error("Token has expired")]
    ExpiredToken,

    #[error("Invalid token signature")]
    InvalidSignature,

    #[error("Token lifetime out of range")]
    LifetimeOutOfRange,
}

impl From<JwtError> for AuthError {
    fn from(err: JwtError) -> Self {
        AuthError::Encoding(err.to_string())
    }
}

/// Issues and checks signed tokens
#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("issuer", &self.issuer)
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish_non_exhaustive()
    }
}

impl TokenCodec {
    pub fn new(config: &JwtConfig) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            issuer: config.issuer.clone(),
            access_ttl: Duration::from_secs(config.access_expiration_secs),
            refresh_ttl: Duration::from_secs(config.refresh_expiration_secs),
        }
    }

    /// Sign a token for `subject` expiring `ttl` from now
    pub fn issue(
        &self,
        subject: &str,
        extra: &ExtraClaims,
        ttl: Duration,
    ) -> Result<String, JwtError> {
        let now = Utc::now().timestamp().max(0) as u64;
        let exp = now
            .checked_add(ttl.as_secs())
            .filter(|exp| i64::try_from(*exp).is_ok())
            .ok_or(JwtError::LifetimeOutOfRange)?;

        let claims = Claims {
            iss: self.issuer.clone(),
            sub: subject.to_string(),
            jti: Uuid::new_v4().to_string(),
            iat: now,
            exp,
            role: extra.role.clone(),
            account_id: extra.account_id,
            token_use: extra.token_use,
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)?;
        Ok(token)
    }

    /// Short-lived token carrying the account's role and id
    pub fn issue_access(&self, account: &Account) -> Result<String, JwtError> {
        self.issue(
            &account.identity,
            &ExtraClaims::for_account(account, TokenUse::Access),
            self.access_ttl,
        )
    }

    /// Long-lived token recorded in the session ledger
    pub fn issue_refresh(&self, account: &Account) -> Result<String, JwtError> {
        self.issue(
            &account.identity,
            &ExtraClaims::for_account(account, TokenUse::Refresh),
            self.refresh_ttl,
        )
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation.leeway = 0;
        validation
    }

    /// Fully validate a token and return its claims
    pub fn decode(&self, token: &str) -> Result<Claims, JwtError> {
        let token_data = decode::<Claims>(token, &self.decoding_key, &self.validation())
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::ExpiredToken,
                jsonwebtoken::errors::ErrorKind::InvalidSignature => JwtError::InvalidSignature,
                _ => JwtError::InvalidToken,
            })?;

        Ok(token_data.claims)
    }

    /// True only for a well-formed, correctly signed, unexpired token from this
    /// issuer whose subject is `expected_subject`
    pub fn verify(&self, token: &str, expected_subject: &str) -> bool {
        match self.decode(token) {
            Ok(claims) => claims.sub == expected_subject,
            Err(e) => {
                tracing::debug!(error = %e, "Token failed verification");
                false
            }
        }
    }

    /// Read the subject without checking signature or expiry
    ///
    /// The result is not proof of authenticity; callers must still `verify`.
    pub fn extract_subject(&self, token: &str) -> Option<String> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        decode::<Claims>(token, &DecodingKey::from_secret(&[]), &validation)
            .ok()
            .map(|data| data.claims.sub)
            .filter(|sub| !sub.is_empty())
    }
}
