use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::PermissionLevel;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    #[serde(skip)]
    pub password_hash: String,
    pub is_admin: bool,
    /// Marks the bootstrap administrator. Set only at bootstrap, never by
    /// an update.
    pub is_root: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields required to insert a user. The id is assigned by the store.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
    pub is_admin: bool,
    pub is_root: bool,
}

/// The resolved identity of an authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Subject {
    pub user_id: i64,
    pub username: String,
    pub is_admin: bool,
    pub is_root: bool,
}

impl From<&User> for Subject {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id,
            username: user.username.clone(),
            is_admin: user.is_admin,
            is_root: user.is_root,
        }
    }
}

impl From<User> for Subject {
    fn from(user: User) -> Self {
        Self {
            user_id: user.id,
            username: user.username,
            is_admin: user.is_admin,
            is_root: user.is_root,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourcePermission {
    pub resource_id: String,
    pub user_id: i64,
    pub level: PermissionLevel,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A grant joined with the grantee's username, for listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PermissionListing {
    pub user_id: i64,
    pub username: String,
    pub level: PermissionLevel,
}

/// Server-side session row. Only the SHA-256 digest of the token is stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    #[serde(skip)]
    pub token_digest: String,
    pub user_id: i64,
    pub username: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// The opaque value handed to the client. Never logged.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken(String);

impl SessionToken {
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken(..)")
    }
}

/// A host-owned resource that grants are scoped to, e.g. an experiment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}
