use std::sync::Arc;

use super::PasswordHasher;
use crate::error::{Error, Result};
use crate::store::CredentialStore;
use crate::types::User;

/// Checks a username/password pair against the credential store.
pub struct CredentialVerifier {
    store: Arc<dyn CredentialStore>,
    hasher: PasswordHasher,
}

impl CredentialVerifier {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self {
            store,
            hasher: PasswordHasher::new(),
        }
    }

    /// Returns the user on success. An unknown username and a wrong password
    /// both fail with `Error::InvalidCredentials`.
    pub fn verify(&self, username: &str, password: &str) -> Result<User> {
        let Some(user) = self.store.find_user_by_username(username)? else {
            self.hasher.verify_dummy(password);
            return Err(Error::InvalidCredentials);
        };

        if self.hasher.verify(password, &user.password_hash)? {
            Ok(user)
        } else {
            Err(Error::InvalidCredentials)
        }
    }
}
