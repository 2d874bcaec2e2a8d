//! Request and response types for the authentication endpoints
//!
//! Wire format is camelCase JSON.

use authgate_core::{Account, AccountId, Role};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Self-registration request
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[serde(alias = "email")]
    pub identity: String,
    pub password: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

/// Login request
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[serde(alias = "email")]
    pub identity: String,
    pub password: String,
}

/// Password change for the authenticated account
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PasswordUpdateRequest {
    pub current_password: String,
    pub new_password: String,
}

/// Start a password reset
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ForgotPasswordRequest {
    #[serde(alias = "email")]
    pub identity: String,
}

/// Complete a password reset
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub token: String,
    pub new_password: String,
}

/// Access and refresh token issued together
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Result of a successful refresh; the refresh token is the one presented
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub access_token: String,
    pub refresh_token: String,
}

/// Tokens and identity returned by a successful login
#[derive(Debug, Clone)]
pub struct LoginSuccess {
    pub access_token: String,
    pub refresh_token: String,
    pub account_id: AccountId,
    pub role: Role,
    pub identity: String,
}

/// Why a login was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    NotConfirmed,
    InvalidCredentials,
}

impl RejectReason {
    pub fn message(&self) -> &'static str {
        match self {
            RejectReason::NotConfirmed => "Account not confirmed",
            RejectReason::InvalidCredentials => "Invalid credentials",
        }
    }
}

/// Login result: either a session or a human-readable refusal
#[derive(Debug, Clone)]
pub enum LoginOutcome {
    Success(LoginSuccess),
    Rejected(RejectReason),
}

/// Login response envelope
///
/// `error` is null on success; every other field is null on rejection.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginEnvelope {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub account_id: Option<i64>,
    pub role: Option<String>,
    pub identity: Option<String>,
    pub error: Option<String>,
}

impl From<LoginOutcome> for LoginEnvelope {
    fn from(outcome: LoginOutcome) -> Self {
        match outcome {
            LoginOutcome::Success(success) => Self {
                access_token: Some(success.access_token),
                refresh_token: Some(success.refresh_token),
                account_id: Some(success.account_id),
                role: Some(success.role.as_str().to_string()),
                identity: Some(success.identity),
                error: None,
            },
            LoginOutcome::Rejected(reason) => Self {
                access_token: None,
                refresh_token: None,
                account_id: None,
                role: None,
                identity: None,
                error: Some(reason.message().to_string()),
            },
        }
    }
}

/// Plain acknowledgement
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Public view of an account
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AccountProfile {
    pub id: i64,
    pub identity: String,
    pub first_name: String,
    pub last_name: String,
    pub role: String,
    pub confirmed: bool,
}

impl From<Account> for AccountProfile {
    fn from(account: Account) -> Self {
        Self {
            id: account.id,
            role: account.role.as_str().to_string(),
            identity: account.identity,
            first_name: account.first_name,
            last_name: account.last_name,
            confirmed: account.confirmed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[test]
    fn test_success_envelope() {
        let envelope = LoginEnvelope::from(LoginOutcome::Success(LoginSuccess {
            access_token: "access".to_string(),
            refresh_token: "refresh".to_string(),
            account_id: 7,
            role: Role::Storekeeper,
            identity: "store@plant.example".to_string(),
        }));

        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(value["accessToken"], "access");
        assert_eq!(value["refreshToken"], "refresh");
        assert_eq!(value["accountId"], 7);
        assert_eq!(value["role"], "STOREKEEPER");
        assert_eq!(value["error"], Value::Null);
    }

    #[test]
    fn test_rejected_envelope() {
        let envelope =
            LoginEnvelope::from(LoginOutcome::Rejected(RejectReason::NotConfirmed));

        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(value["error"], "Account not confirmed");
        assert_eq!(value["accessToken"], Value::Null);
        assert_eq!(value["refreshToken"], Value::Null);
    }

    #[test]
    fn test_register_request_accepts_email_alias() {
        let request: RegisterRequest = serde_json::from_value(json!({
            "email": "new@plant.example",
            "password": "pw",
            "firstName": "New",
        }))
        .unwrap();

        assert_eq!(request.identity, "new@plant.example");
        assert_eq!(request.first_name, "New");
        assert_eq!(request.last_name, "");
    }
}
