//! authgate CLI - Operator tooling
//!
//! Usage:
//!   authgate hash-password <password>
//!   authgate issue-token --subject <identity> [--role <role>] [--refresh]
//!   authgate inspect <token>
//!   authgate check-config
//!   authgate migrate
//!   authgate confirm-account <identity>

use anyhow::{bail, Context};
use authgate_api::auth::{Argon2PasswordEncoder, ExtraClaims, TokenCodec, TokenUse};
use authgate_api::state::AppState;
use authgate_core::{AppConfig, CredentialStore, PasswordEncoder, PgStore, Role};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "authgate")]
#[command(about = "Token authentication and session management CLI")]
#[command(version)]
struct Cli {
    /// TOML configuration file (defaults to $AUTHGATE_CONFIG)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Hash a password with the configured argon2 parameters
    HashPassword {
        /// Plaintext password
        password: String,
    },
    /// Sign a token with the configured secret
    IssueToken {
        /// Token subject (account identity)
        #[arg(long)]
        subject: String,
        /// Role claim
        #[arg(long)]
        role: Option<String>,
        /// Account id claim
        #[arg(long)]
        account_id: Option<i64>,
        /// Issue a refresh token instead of an access token
        #[arg(long)]
        refresh: bool,
        /// Lifetime in seconds (defaults to the configured TTL)
        #[arg(long)]
        ttl: Option<u64>,
    },
    /// Show a token's subject and, if it verifies, its claims
    Inspect {
        /// Encoded token
        token: String,
    },
    /// Validate and print the effective configuration
    CheckConfig,
    /// Apply database migrations
    Migrate,
    /// Confirm a registered account so it can log in
    ConfirmAccount {
        /// Account identity
        identity: String,
    },
}

fn load_config(path: Option<PathBuf>) -> anyhow::Result<AppConfig> {
    let path = path.or_else(|| std::env::var_os("AUTHGATE_CONFIG").map(PathBuf::from));
    let config = match path {
        Some(path) => AppConfig::from_file(path)?.with_env_override()?,
        None => AppConfig::from_env()?,
    };
    config.validate()?;
    Ok(config)
}

/// Copy of `config` safe to print
fn redacted(config: &AppConfig) -> AppConfig {
    let mut shown = config.clone();
    shown.jwt.secret = "<redacted>".to_string();
    if shown.database.url.is_some() {
        shown.database.url = Some("<redacted>".to_string());
    }
    shown
}

fn require_database(config: &AppConfig) -> anyhow::Result<&str> {
    match config.database.url.as_deref() {
        Some(url) => Ok(url),
        None => bail!("DATABASE_URL is not set"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| {
                    "authgate=info,authgate_core=warn,authgate_api=warn,audit=info".into()
                }),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config)?;

    match cli.command {
        Commands::HashPassword { password } => {
            let encoder = Argon2PasswordEncoder::new(&config.password)?;
            println!("{}", encoder.hash(&password)?);
        }
        Commands::IssueToken {
            subject,
            role,
            account_id,
            refresh,
            ttl,
        } => {
            let role = match role {
                Some(raw) => Some(
                    Role::parse(&raw)
                        .with_context(|| format!("Unknown role: {raw}"))?
                        .as_str()
                        .to_string(),
                ),
                None => None,
            };
            let (token_use, default_ttl) = if refresh {
                (TokenUse::Refresh, config.jwt.refresh_expiration_secs)
            } else {
                (TokenUse::Access, config.jwt.access_expiration_secs)
            };
            let extra = ExtraClaims {
                role,
                account_id,
                token_use,
            };

            let codec = TokenCodec::new(&config.jwt);
            let token = codec.issue(
                &subject,
                &extra,
                Duration::from_secs(ttl.unwrap_or(default_ttl)),
            )?;
            println!("{token}");
        }
        Commands::Inspect { token } => {
            let codec = TokenCodec::new(&config.jwt);
            let Some(subject) = codec.extract_subject(&token) else {
                bail!("Token has no readable subject");
            };
            println!("subject: {subject}");

            match codec.decode(&token) {
                Ok(claims) => {
                    println!("verified: true");
                    println!("{}", serde_json::to_string_pretty(&claims)?);
                }
                Err(e) => println!("verified: false ({e})"),
            }
        }
        Commands::CheckConfig => {
            if config.jwt.uses_development_secret() {
                tracing::warn!("JWT_SECRET not set; the development secret is in use");
            }
            println!("{}", serde_json::to_string_pretty(&redacted(&config))?);
        }
        Commands::Migrate => {
            let url = require_database(&config)?;
            // connecting applies the bundled schema
            PgStore::connect(url, config.database.max_connections).await?;
            tracing::info!("Migrations applied");
        }
        Commands::ConfirmAccount { identity } => {
            require_database(&config)?;
            let state = AppState::connect(config).await?;

            let Some(account) = state.accounts.find_by_identity(&identity).await? else {
                bail!("No account registered as {identity}");
            };
            let account = state.auth.confirm_account(account.id).await?;
            tracing::info!(account_id = account.id, identity = %account.identity, "Account confirmed");
        }
    }

    Ok(())
}
