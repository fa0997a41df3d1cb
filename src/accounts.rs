//! User account administration.
//!
//! Every mutation here is checked against the acting subject, so the HTTP
//! layer cannot forget a precedence rule.

use std::sync::Arc;

use crate::auth::{PasswordHasher, check_length};
use crate::authz::{check_admin_change, check_user_deletion};
use crate::error::{Error, Result};
use crate::store::CredentialStore;
use crate::types::{NewUser, Subject, User};
use crate::validation::validate_username;

#[derive(Debug)]
pub enum Bootstrap {
    Created(User),
    AlreadyPresent,
}

pub struct Accounts {
    store: Arc<dyn CredentialStore>,
    hasher: PasswordHasher,
}

impl Accounts {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self {
            store,
            hasher: PasswordHasher::new(),
        }
    }

    /// Fails with `Error::Conflict` when the username is taken.
    pub fn create_user(&self, username: &str, password: &str, is_admin: bool) -> Result<User> {
        validate_username(username)?;
        let password_hash = self.hasher.hash(password)?;

        let user = self.store.insert_user(&NewUser {
            username: username.to_string(),
            password_hash,
            is_admin,
            is_root: false,
        })?;

        tracing::info!(user = %user.username, is_admin, "Created user");
        Ok(user)
    }

    pub fn get_user(&self, username: &str) -> Result<User> {
        self.store
            .find_user_by_username(username)?
            .ok_or(Error::NotFound)
    }

    pub fn get_user_by_id(&self, id: i64) -> Result<User> {
        self.store.find_user_by_id(id)?.ok_or(Error::NotFound)
    }

    pub fn list_users(&self, after_id: i64, limit: i32) -> Result<Vec<User>> {
        self.store.list_users(after_id, limit)
    }

    /// Applies the deletion precedence rules, then deletes. The user's
    /// sessions and grants go with it.
    pub fn delete_user(&self, target_id: i64, actor: &Subject) -> Result<User> {
        let target = self.get_user_by_id(target_id)?;

        if let Err(refusal) = check_user_deletion(actor, &target) {
            tracing::info!(actor = %actor.username, target = %target.username, "Refused deletion: {refusal}");
            return Err(refusal.into());
        }

        if !self.store.delete_user(target.id)? {
            return Err(Error::NotFound);
        }

        tracing::info!(actor = %actor.username, target = %target.username, "Deleted user");
        Ok(target)
    }

    /// Users may change their own password; admins may change anyone's.
    pub fn update_password(&self, username: &str, password: &str, actor: &Subject) -> Result<()> {
        if !actor.is_admin && actor.username != username {
            return Err(Error::Forbidden(
                "cannot change another user's password".to_string(),
            ));
        }

        let target = self.get_user(username)?;
        check_length(password)?;
        let password_hash = self.hasher.hash(password)?;
        self.store.update_user_password(target.id, &password_hash)?;

        tracing::info!(actor = %actor.username, target = %target.username, "Updated password");
        Ok(())
    }

    pub fn set_admin(&self, target_id: i64, is_admin: bool, actor: &Subject) -> Result<User> {
        let target = self.get_user_by_id(target_id)?;
        check_admin_change(actor, &target, is_admin)?;

        self.store.update_user_admin(target.id, is_admin)?;
        tracing::info!(actor = %actor.username, target = %target.username, is_admin, "Updated admin flag");
        self.get_user_by_id(target.id)
    }

    /// Creates the root admin unless one exists. Losing a creation race to
    /// another process counts as already present. Fails with
    /// `Error::Conflict` when the username is held by a non-root user.
    pub fn bootstrap_root(&self, username: &str, password: &str) -> Result<Bootstrap> {
        if self.store.has_root_admin()? {
            return Ok(Bootstrap::AlreadyPresent);
        }

        validate_username(username)?;
        let password_hash = self.hasher.hash(password)?;
        let result = self.store.insert_user(&NewUser {
            username: username.to_string(),
            password_hash,
            is_admin: true,
            is_root: true,
        });

        match result {
            Ok(user) => {
                tracing::info!(user = %user.username, "Created root admin");
                Ok(Bootstrap::Created(user))
            }
            Err(Error::Conflict(_)) => {
                if self.store.has_root_admin()? {
                    return Ok(Bootstrap::AlreadyPresent);
                }
                tracing::error!(user = username, "Username taken by a non-root user");
                Err(Error::Conflict(format!(
                    "username '{username}' belongs to a non-root user; root admin not created"
                )))
            }
            Err(e) => Err(e),
        }
    }
}
