//! Application state management
//!
//! Author: hephaex@gmail.com

use crate::auth::{Argon2PasswordEncoder, AuthService, ResetNotifier, TokenCodec};
use authgate_core::config::AppConfig;
use authgate_core::{
    CredentialStore, JwtConfig, MemoryCredentialStore, MemoryTokenLedger, PasswordConfig,
    PgStore, TokenLedger,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Which storage backend holds accounts and sessions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Memory,
    Postgres,
}

impl StorageBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageBackend::Memory => "memory",
            StorageBackend::Postgres => "postgres",
        }
    }
}

/// Application state shared across handlers
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,
    /// Authentication service
    pub auth: AuthService,
    /// Account storage
    pub accounts: Arc<dyn CredentialStore>,
    /// Session token storage
    pub ledger: Arc<dyn TokenLedger>,
    /// Storage backend in use
    pub backend: StorageBackend,
    /// Server start time
    pub start_time: Instant,
    /// Ready status
    pub is_ready: AtomicBool,
}

impl AppState {
    /// Assemble state around the given stores
    pub fn new(
        config: AppConfig,
        accounts: Arc<dyn CredentialStore>,
        ledger: Arc<dyn TokenLedger>,
        backend: StorageBackend,
    ) -> anyhow::Result<Self> {
        let encoder = Argon2PasswordEncoder::new(&config.password)?;
        Ok(Self::assemble(config, accounts, ledger, backend, encoder))
    }

    fn assemble(
        config: AppConfig,
        accounts: Arc<dyn CredentialStore>,
        ledger: Arc<dyn TokenLedger>,
        backend: StorageBackend,
        encoder: Argon2PasswordEncoder,
    ) -> Self {
        let auth = AuthService::new(
            accounts.clone(),
            ledger.clone(),
            Arc::new(encoder),
            TokenCodec::new(&config.jwt),
            Duration::from_secs(config.password.reset_expiration_secs),
        );

        Self {
            config,
            auth,
            accounts,
            ledger,
            backend,
            start_time: Instant::now(),
            is_ready: AtomicBool::new(true),
        }
    }

    /// State backed by in-memory stores
    pub fn in_memory(config: AppConfig) -> anyhow::Result<Self> {
        Self::new(
            config,
            Arc::new(MemoryCredentialStore::new()),
            Arc::new(MemoryTokenLedger::new()),
            StorageBackend::Memory,
        )
    }

    /// State backed by PostgreSQL when a database URL is configured,
    /// in-memory stores otherwise
    pub async fn connect(config: AppConfig) -> anyhow::Result<Self> {
        match config.database.url.clone() {
            Some(url) => {
                let store = PgStore::connect(&url, config.database.max_connections).await?;
                tracing::info!("Connected to PostgreSQL");
                let store = Arc::new(store);
                Self::new(config, store.clone(), store, StorageBackend::Postgres)
            }
            None => {
                tracing::warn!("DATABASE_URL not set; accounts and sessions are kept in memory");
                Self::in_memory(config)
            }
        }
    }

    /// In-memory state with a fixed secret and cheap password hashing
    pub fn for_testing() -> Self {
        let config = AppConfig {
            jwt: JwtConfig {
                secret: "test-secret-key".to_string(),
                ..Default::default()
            },
            password: PasswordConfig {
                memory_cost: 1024,
                time_cost: 1,
                parallelism: 1,
                ..Default::default()
            },
            ..Default::default()
        };

        let encoder = Argon2PasswordEncoder::new(&config.password).unwrap_or_default();
        Self::assemble(
            config,
            Arc::new(MemoryCredentialStore::new()),
            Arc::new(MemoryTokenLedger::new()),
            StorageBackend::Memory,
            encoder,
        )
    }

    /// Replace the password reset notifier
    pub fn with_reset_notifier(self, notifier: Arc<dyn ResetNotifier>) -> Self {
        Self {
            auth: self.auth.with_notifier(notifier),
            ..self
        }
    }

    /// Whether the session gate skips `path`
    pub fn is_public_path(&self, path: &str) -> bool {
        self.config
            .server
            .public_paths
            .iter()
            .any(|prefix| path.starts_with(prefix.as_str()))
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Check if service is ready
    pub fn is_ready(&self) -> bool {
        self.is_ready.load(Ordering::SeqCst)
    }

    /// Set ready status
    pub fn set_ready(&self, ready: bool) {
        self.is_ready.store(ready, Ordering::SeqCst);
    }
}
