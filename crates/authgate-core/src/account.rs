//! Account model
//!
//! An account is the root of everything this crate persists: it owns its
//! credentials, its role and the session token records issued for it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Account identifier assigned by the credential store
pub type AccountId = i64;

/// Account role
///
/// Carried as an opaque claim in issued tokens. The set is closed:
/// - Admin: system administration
/// - ProjectManager: owns projects and plans interventions
/// - Storekeeper: manages spare parts stock
/// - CorrectiveTechnician: handles breakdown interventions
/// - PreventiveTechnician: handles scheduled maintenance
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    ProjectManager,
    Storekeeper,
    CorrectiveTechnician,
    #[default]
    PreventiveTechnician,
}

impl Role {
    /// Convert role to its claim representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::ProjectManager => "PROJECT_MANAGER",
            Role::Storekeeper => "STOREKEEPER",
            Role::CorrectiveTechnician => "CORRECTIVE_TECHNICIAN",
            Role::PreventiveTechnician => "PREVENTIVE_TECHNICIAN",
        }
    }

    /// Parse role from its claim representation (case-insensitive)
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "ADMIN" => Some(Role::Admin),
            "PROJECT_MANAGER" => Some(Role::ProjectManager),
            "STOREKEEPER" => Some(Role::Storekeeper),
            "CORRECTIVE_TECHNICIAN" => Some(Role::CorrectiveTechnician),
            "PREVENTIVE_TECHNICIAN" => Some(Role::PreventiveTechnician),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// User account
///
/// `id == 0` means the account has not been saved yet; the store assigns the
/// real identifier on first save.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,

    /// Login identifier (email-like), always stored lower-cased
    pub identity: String,

    /// Password digest produced by a `PasswordEncoder`
    #[serde(skip_serializing)]
    pub password_hash: String,

    pub first_name: String,

    pub last_name: String,

    pub role: Role,

    /// Set by the external confirmation flow; login is refused until true
    #[serde(default)]
    pub confirmed: bool,

    #[serde(skip_serializing)]
    pub reset_token: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset_token_expires_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Create a new, unsaved and unconfirmed account
    pub fn new(
        identity: &str,
        password_hash: String,
        first_name: String,
        last_name: String,
        role: Role,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            identity: normalize_identity(identity),
            password_hash,
            first_name,
            last_name,
            role,
            confirmed: false,
            reset_token: None,
            reset_token_expires_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether a password reset token is set and not yet expired
    pub fn is_reset_token_valid(&self) -> bool {
        match (&self.reset_token, self.reset_token_expires_at) {
            (Some(_), Some(expires_at)) => Utc::now() < expires_at,
            _ => false,
        }
    }

    /// Clear any pending password reset
    pub fn clear_reset_token(&mut self) {
        self.reset_token = None;
        self.reset_token_expires_at = None;
    }
}

/// Canonical form of an identity: trimmed and lower-cased
pub fn normalize_identity(identity: &str) -> String {
    identity.trim().to_lowercase()
}
