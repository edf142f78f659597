use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use tracing::debug;

use crate::error::{Result, ShelfError};

/// Decides whether a username/secret pair may obtain a token.
pub trait CredentialVerifier: Send + Sync {
    fn verify(&self, username: &str, secret: &str) -> bool;
}

/// Fixed set of users with argon2 PHC password hashes, typically from configuration.
#[derive(Clone, Debug, Default)]
pub struct StaticCredentials {
    users: Vec<(String, String)>,
}

impl StaticCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, username: impl Into<String>, phc_hash: impl Into<String>) -> Result<Self> {
        let username = username.into();
        let phc_hash = phc_hash.into();
        if username.is_empty() {
            return Err(ShelfError::Config("credential username is empty".into()));
        }
        PasswordHash::new(&phc_hash).map_err(|e| {
            ShelfError::Config(format!("password hash for {username:?} is not a PHC string: {e}"))
        })?;
        self.users.push((username, phc_hash));
        Ok(self)
    }
}

impl CredentialVerifier for StaticCredentials {
    fn verify(&self, username: &str, secret: &str) -> bool {
        let Some((_, hash)) = self.users.iter().find(|(u, _)| u == username) else {
            debug!(username, "unknown user");
            return false;
        };
        let Ok(parsed) = PasswordHash::new(hash) else {
            return false;
        };
        let ok = Argon2::default()
            .verify_password(secret.as_bytes(), &parsed)
            .is_ok();
        debug!(username, ok, "password check");
        ok
    }
}

/// Argon2id PHC string for `plain` with a random salt.
pub fn hash_password(plain: &str) -> Result<String> {
    let mut salt = [0u8; 16];
    getrandom::getrandom(&mut salt)
        .map_err(|e| ShelfError::Config(format!("random source: {e}")))?;
    let salt = SaltString::encode_b64(&salt)
        .map_err(|e| ShelfError::Config(format!("salt encoding: {e}")))?;
    let hash = Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| ShelfError::Config(format!("password hashing: {e}")))?;
    Ok(hash.to_string())
}
