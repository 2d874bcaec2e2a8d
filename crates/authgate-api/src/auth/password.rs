//! Password hashing and verification using Argon2id
//!
//! Digests are PHC strings (`$argon2id$v=19$m=...,t=...,p=...$salt$hash`), so
//! the parameters travel with the hash and older digests keep verifying after
//! the configuration changes.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use authgate_core::{AuthError, PasswordConfig, PasswordEncoder};
use thiserror::Error;

/// Password hashing errors
#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("Invalid Argon2 parameters: {0}")]
    InvalidParams(String),

    #[error("Failed to hash password: {0}")]
    HashingFailed(String),
}

impl From<PasswordError> for AuthError {
    fn from(err: PasswordError) -> Self {
        AuthError::Other(anyhow::Error::new(err))
    }
}

/// `PasswordEncoder` backed by Argon2id
#[derive(Debug, Clone)]
pub struct Argon2PasswordEncoder {
    params: Params,
}

impl Argon2PasswordEncoder {
    /// Build an encoder from configured costs
    pub fn new(config: &PasswordConfig) -> Result<Self, PasswordError> {
        let params = Params::new(
            config.memory_cost,
            config.time_cost,
            config.parallelism,
            Some(32),
        )
        .map_err(|e| PasswordError::InvalidParams(e.to_string()))?;

        Ok(Self { params })
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }
}

impl Default for Argon2PasswordEncoder {
    fn default() -> Self {
        Self {
            params: Params::default(),
        }
    }
}

impl PasswordEncoder for Argon2PasswordEncoder {
    fn hash(&self, plaintext: &str) -> authgate_core::Result<String> {
        let salt = SaltString::generate(&mut OsRng);

        let digest = self
            .argon2()
            .hash_password(plaintext.as_bytes(), &salt)
            .map_err(|e| PasswordError::HashingFailed(e.to_string()))?;

        Ok(digest.to_string())
    }

    fn matches(&self, plaintext: &str, digest: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(digest) else {
            tracing::warn!("Stored password digest is not a PHC string");
            return false;
        };

        self.argon2()
            .verify_password(plaintext.as_bytes(), &parsed)
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoder() -> Argon2PasswordEncoder {
        // lighter than production costs
        Argon2PasswordEncoder::new(&PasswordConfig {
            memory_cost: 1024,
            time_cost: 1,
            parallelism: 1,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_hash_and_match() {
        let encoder = encoder();
        let digest = encoder.hash("SecureP@ssw0rd!").unwrap();

        assert!(digest.starts_with("$argon2id$"));
        assert!(encoder.matches("SecureP@ssw0rd!", &digest));
        assert!(!encoder.matches("WrongPassword", &digest));
    }

    #[test]
    fn test_same_password_produces_different_hashes() {
        let encoder = encoder();
        let hash1 = encoder.hash("SamePassword123!").unwrap();
        let hash2 = encoder.hash("SamePassword123!").unwrap();

        assert_ne!(hash1, hash2);
        assert!(encoder.matches("SamePassword123!", &hash1));
        assert!(encoder.matches("SamePassword123!", &hash2));
    }

    #[test]
    fn test_malformed_digest_never_matches() {
        assert!(!encoder().matches("password", "invalid-hash-format"));
        assert!(!encoder().matches("password", ""));
    }

    #[test]
    fn test_digest_carries_parameters() {
        let digest = encoder().hash("TestPassword123!").unwrap();
        assert!(digest.contains("m=1024"));
        assert!(digest.contains("t=1"));
        assert!(digest.contains("p=1"));

        // verifies under different configured costs
        let other = Argon2PasswordEncoder::new(&PasswordConfig {
            memory_cost: 2048,
            time_cost: 2,
            parallelism: 1,
            ..Default::default()
        })
        .unwrap();
        assert!(other.matches("TestPassword123!", &digest));
    }

    #[test]
    fn test_invalid_params_rejected() {
        let result = Argon2PasswordEncoder::new(&PasswordConfig {
            memory_cost: 1,
            time_cost: 0,
            parallelism: 1,
            ..Default::default()
        });
        assert!(matches!(result, Err(PasswordError::InvalidParams(_))));
    }
}
