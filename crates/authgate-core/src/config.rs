//! authgate Configuration Management
//!
//! Handles configuration from environment variables and TOML config files
//! with sensible defaults for development.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Signing secret used when nothing else is configured
pub const DEVELOPMENT_SECRET: &str = "development-secret-key-change-in-production";

/// Upper bound for any token or reset lifetime (ten years)
pub const MAX_LIFETIME_SECS: u64 = 10 * 365 * 24 * 60 * 60;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Server configuration
    pub server: ServerConfig,

    /// Database connection
    pub database: DatabaseConfig,

    /// Token signing and lifetimes
    pub jwt: JwtConfig,

    /// Password hashing and reset
    pub password: PasswordConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    match std::env::var(key) {
        Ok(value) => value
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                value,
            }),
        Err(_) => Ok(None),
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Load from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::FileReadError {
            path: path.clone(),
            source: e,
        })?;

        Self::from_toml_str(&content).map_err(|message| ConfigError::ParseError { path, message })
    }

    fn from_toml_str(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| e.to_string())
    }

    /// Overlay environment variables on this configuration (env takes precedence)
    pub fn with_env_override(mut self) -> Result<Self, ConfigError> {
        self.apply_env()?;
        Ok(self)
    }

    fn apply_env(&mut self) -> Result<(), ConfigError> {
        // Server
        if let Ok(host) = std::env::var("API_HOST") {
            self.server.host = host;
        }
        if let Some(port) = parse_env("API_PORT")? {
            self.server.port = port;
        }

        // PostgreSQL
        if let Ok(url) = std::env::var("DATABASE_URL") {
            self.database.url = Some(url);
        }
        if let Some(max) = parse_env("DATABASE_MAX_CONNECTIONS")? {
            self.database.max_connections = max;
        }

        // JWT
        if let Ok(secret) = std::env::var("JWT_SECRET") {
            self.jwt.secret = secret;
        }
        if let Ok(issuer) = std::env::var("JWT_ISSUER") {
            self.jwt.issuer = issuer;
        }
        if let Some(secs) = parse_env("JWT_ACCESS_EXPIRATION_SECS")? {
            self.jwt.access_expiration_secs = secs;
        }
        if let Some(secs) = parse_env("JWT_REFRESH_EXPIRATION_SECS")? {
            self.jwt.refresh_expiration_secs = secs;
        }

        // Password
        if let Some(secs) = parse_env("PASSWORD_RESET_EXPIRATION_SECS")? {
            self.password.reset_expiration_secs = secs;
        }
        if let Some(kib) = parse_env("ARGON2_MEMORY_KIB")? {
            self.password.memory_cost = kib;
        }

        // Logging
        if let Ok(level) = std::env::var("LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(json) = parse_env("LOG_JSON")? {
            self.logging.json_format = json;
        }

        Ok(())
    }

    /// Reject configurations the service cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt.secret.is_empty() {
            return Err(ConfigError::MissingRequired("JWT_SECRET".to_string()));
        }

        let lifetimes = [
            ("JWT_ACCESS_EXPIRATION_SECS", self.jwt.access_expiration_secs),
            ("JWT_REFRESH_EXPIRATION_SECS", self.jwt.refresh_expiration_secs),
            ("PASSWORD_RESET_EXPIRATION_SECS", self.password.reset_expiration_secs),
        ];
        for (key, secs) in lifetimes {
            if secs == 0 || secs > MAX_LIFETIME_SECS {
                return Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    value: secs.to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Path prefixes the authentication gate never inspects
    pub public_paths: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            public_paths: vec![
                "/health".to_string(),
                "/ready".to_string(),
                "/api/v1/auth/".to_string(),
                "/api-docs".to_string(),
                "/swagger-ui".to_string(),
            ],
        }
    }
}

/// Database connection configuration
///
/// Without a URL the server keeps accounts and sessions in memory.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: Option<String>,

    /// PostgreSQL connection pool size
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 5,
        }
    }
}

/// JWT configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JwtConfig {
    /// Secret key for HMAC signing
    pub secret: String,

    /// Token issuer identifier
    pub issuer: String,

    /// Access token lifetime in seconds (default: 900 = 15 minutes)
    pub access_expiration_secs: u64,

    /// Refresh token lifetime in seconds (default: 604800 = 7 days)
    pub refresh_expiration_secs: u64,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            secret: DEVELOPMENT_SECRET.to_string(),
            issuer: "authgate".to_string(),
            access_expiration_secs: 900,
            refresh_expiration_secs: 7 * 24 * 3600,
        }
    }
}

impl JwtConfig {
    /// Whether the built-in development secret is still in use
    pub fn uses_development_secret(&self) -> bool {
        self.secret == DEVELOPMENT_SECRET
    }
}

/// Password hashing and reset configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PasswordConfig {
    /// Argon2 memory cost in KiB (default: 65536 = 64 MiB)
    pub memory_cost: u32,

    /// Argon2 time cost (iterations)
    pub time_cost: u32,

    /// Argon2 parallelism
    pub parallelism: u32,

    /// Password reset token lifetime in seconds (default: 3600)
    pub reset_expiration_secs: u64,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            memory_cost: 65536,
            time_cost: 3,
            parallelism: 4,
            reset_expiration_secs: 3600,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level or filter directive (trace, debug, info, warn, error)
    pub level: String,

    /// JSON format for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.jwt.access_expiration_secs, 900);
        assert_eq!(config.jwt.refresh_expiration_secs, 604800);
        assert!(config.database.url.is_none());
        assert!(config.jwt.uses_development_secret());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml() {
        let config = AppConfig::from_toml_str(
            r#"
            [jwt]
            secret = "file-secret"
            access_expiration_secs = 60

            [server]
            port = 9090
            "#,
        )
        .unwrap();

        assert_eq!(config.jwt.secret, "file-secret");
        assert_eq!(config.jwt.access_expiration_secs, 60);
        assert_eq!(config.jwt.issuer, "authgate");
        assert_eq!(config.server.port, 9090);
        assert!(!config.server.public_paths.is_empty());
    }

    #[test]
    fn test_invalid_toml() {
        assert!(AppConfig::from_toml_str("[jwt\nsecret=").is_err());
    }

    #[test]
    fn test_missing_file() {
        let err = AppConfig::from_file("/nonexistent/authgate.toml").unwrap_err();
        assert!(matches!(err, ConfigError::FileReadError { .. }));
    }

    #[test]
    fn test_validate_rejects_empty_secret_and_zero_ttl() {
        let mut config = AppConfig::default();
        config.jwt.secret.clear();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingRequired(_))
        ));

        let mut config = AppConfig::default();
        config.jwt.access_expiration_secs = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_validate_bounds_lifetimes() {
        let mut config = AppConfig::default();
        config.jwt.access_expiration_secs = u64::MAX;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref key, .. }) if key == "JWT_ACCESS_EXPIRATION_SECS"
        ));

        let mut config = AppConfig::default();
        config.password.reset_expiration_secs = MAX_LIFETIME_SECS + 1;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref key, .. }) if key == "PASSWORD_RESET_EXPIRATION_SECS"
        ));

        let mut config = AppConfig::default();
        config.jwt.refresh_expiration_secs = MAX_LIFETIME_SECS;
        assert!(config.validate().is_ok());
    }
}
