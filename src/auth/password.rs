use std::sync::LazyLock;

use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString, rand_core::OsRng},
};

use crate::error::{Error, Result};

const ARGON2_MEMORY_KIB: u32 = 19 * 1024;
const ARGON2_ITERATIONS: u32 = 2;
const ARGON2_PARALLELISM: u32 = 1;
const ARGON2_OUTPUT_LEN: usize = 32;

/// Upper bound on accepted passwords, so nobody can make us hash megabytes.
pub const MAX_PASSWORD_LENGTH: usize = 512;

// Verified against when the username is unknown, so that a miss costs as
// much as a wrong password.
static DUMMY_HASH: LazyLock<Option<String>> =
    LazyLock::new(|| PasswordHasher::new().hash("gatehouse-dummy-password").ok());

pub struct PasswordHasher {
    argon2: Argon2<'static>,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl PasswordHasher {
    #[must_use]
    pub fn new() -> Self {
        let params = Params::new(
            ARGON2_MEMORY_KIB,
            ARGON2_ITERATIONS,
            ARGON2_PARALLELISM,
            Some(ARGON2_OUTPUT_LEN),
        )
        .expect("invalid argon2 params");

        Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        }
    }

    /// Hashes a password with a fresh salt into PHC string format.
    pub fn hash(&self, password: &str) -> Result<String> {
        check_length(password)?;
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| Error::PasswordHash(format!("failed to hash password: {e}")))?;
        Ok(hash.to_string())
    }

    /// Verifies a password against a stored hash.
    pub fn verify(&self, password: &str, hash: &str) -> Result<bool> {
        if password.len() > MAX_PASSWORD_LENGTH {
            return Ok(false);
        }

        let parsed_hash = PasswordHash::new(hash)
            .map_err(|e| Error::PasswordHash(format!("invalid hash format: {e}")))?;

        match self.argon2.verify_password(password.as_bytes(), &parsed_hash) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(Error::PasswordHash(format!("failed to verify password: {e}"))),
        }
    }

    /// Burns the same work as a real verification and always fails.
    pub fn verify_dummy(&self, password: &str) {
        if let Some(hash) = DUMMY_HASH.as_deref() {
            let _ = self.verify(password, hash);
        }
    }
}

pub fn check_length(password: &str) -> Result<()> {
    if password.is_empty() {
        return Err(Error::BadRequest("password cannot be empty".to_string()));
    }
    if password.len() > MAX_PASSWORD_LENGTH {
        return Err(Error::BadRequest(format!(
            "password cannot exceed {MAX_PASSWORD_LENGTH} bytes"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hasher = PasswordHasher::new();
        let hash = hasher.hash("correct horse").unwrap();

        assert!(hasher.verify("correct horse", &hash).unwrap());
        assert!(!hasher.verify("battery staple", &hash).unwrap());
    }

    #[test]
    fn test_hash_is_salted_phc_format() {
        let hasher = PasswordHasher::new();
        let first = hasher.hash("same").unwrap();
        let second = hasher.hash("same").unwrap();

        assert!(first.starts_with("$argon2id$"));
        assert_ne!(first, second);
    }

    #[test]
    fn test_rejects_empty_and_oversized_passwords() {
        let hasher = PasswordHasher::new();
        assert!(hasher.hash("").is_err());

        let long = "x".repeat(MAX_PASSWORD_LENGTH + 1);
        assert!(hasher.hash(&long).is_err());

        let hash = hasher.hash("short").unwrap();
        assert!(!hasher.verify(&long, &hash).unwrap());
    }

    #[test]
    fn test_invalid_stored_hash_is_an_error() {
        let hasher = PasswordHasher::new();
        assert!(hasher.verify("anything", "not-a-hash").is_err());
    }
}
