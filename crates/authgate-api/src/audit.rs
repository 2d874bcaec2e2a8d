//! Security audit logging for authentication events
//!
//! Every event is logged with the "audit" target so it can be filtered and
//! routed separately from application logs, e.g.
//! `RUST_LOG=audit=info,authgate_api=warn`. Gate rejections are routine
//! (any anonymous request with a stale token produces one) and are logged at
//! DEBUG; everything else at INFO.
//!
//! Author: hephaex@gmail.com

use authgate_core::AccountId;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Security audit events for the session lifecycle
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum AuditEvent {
    /// Account created by self-registration
    RegistrationSuccess {
        account_id: AccountId,
        identity: String,
        role: String,
    },

    /// Registration refused
    RegistrationFailure { identity: String, reason: String },

    /// Session opened; any previous session of the account is superseded
    LoginSuccess {
        account_id: AccountId,
        identity: String,
    },

    /// Login refused with a user-facing reason
    LoginRejected { identity: String, reason: String },

    /// New access token minted from a refresh token
    TokenRefresh {
        account_id: AccountId,
        identity: String,
    },

    /// Session token invalidated
    Logout {
        account_id: Option<AccountId>,
        found: bool,
    },

    /// Password changed by the account holder
    PasswordChange { account_id: AccountId },

    /// Reset token issued
    PasswordResetRequested {
        account_id: AccountId,
        identity: String,
    },

    /// Password replaced through a reset token
    PasswordResetCompleted {
        account_id: AccountId,
        sessions_invalidated: u64,
    },

    /// Account confirmed by the external confirmation flow
    AccountConfirmed { account_id: AccountId },

    /// Bearer token presented but no principal attached
    SessionRejected {
        reason: String,
        path: String,
        ip_address: Option<String>,
    },
}

impl AuditEvent {
    fn summary(&self) -> &'static str {
        match self {
            AuditEvent::RegistrationSuccess { .. } => "Registration successful",
            AuditEvent::RegistrationFailure { .. } => "Registration failed",
            AuditEvent::LoginSuccess { .. } => "Login successful",
            AuditEvent::LoginRejected { .. } => "Login rejected",
            AuditEvent::TokenRefresh { .. } => "Token refresh",
            AuditEvent::Logout { .. } => "Logout",
            AuditEvent::PasswordChange { .. } => "Password changed",
            AuditEvent::PasswordResetRequested { .. } => "Password reset requested",
            AuditEvent::PasswordResetCompleted { .. } => "Password reset completed",
            AuditEvent::AccountConfirmed { .. } => "Account confirmed",
            AuditEvent::SessionRejected { .. } => "Session rejected",
        }
    }
}

/// Log a security audit event with structured fields
///
/// The event is serialized to JSON so log aggregators receive one
/// self-describing record, e.g.
///
/// ```json
/// {"event_type":"login_success","account_id":7,"identity":"user@example.com"}
/// ```
pub fn audit_log(event: &AuditEvent) {
    let timestamp = Utc::now();

    let event_json = serde_json::to_string(event)
        .unwrap_or_else(|e| format!("{{\"error\":\"Failed to serialize audit event: {e}\"}}"));

    match event {
        AuditEvent::SessionRejected { reason, path, .. } => {
            debug!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                reason = %reason,
                path = %path,
                "{}",
                event.summary()
            );
        }
        AuditEvent::LoginRejected { identity, reason }
        | AuditEvent::RegistrationFailure { identity, reason } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                identity = %identity,
                reason = %reason,
                "{}",
                event.summary()
            );
        }
        _ => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                "{}",
                event.summary()
            );
        }
    }
}

/// Extract the client IP address from proxy headers
///
/// Checks X-Forwarded-For (first hop) then X-Real-IP.
pub fn extract_ip_address(headers: &axum::http::HeaderMap) -> Option<String> {
    if let Some(xff) = headers.get("x-forwarded-for") {
        if let Ok(xff_str) = xff.to_str() {
            if let Some(first_ip) = xff_str.split(',').next() {
                return Some(first_ip.trim().to_string());
            }
        }
    }

    if let Some(real_ip) = headers.get("x-real-ip") {
        if let Ok(ip_str) = real_ip.to_str() {
            return Some(ip_str.to_string());
        }
    }

    None
}
