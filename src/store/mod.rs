mod schema;
mod sqlite;

pub use sqlite::SqliteStore;

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::types::*;

/// Id of the resource that exists from first start and may never be deleted.
pub const DEFAULT_RESOURCE_ID: &str = "0";

/// CredentialStore owns user and resource-permission rows.
pub trait CredentialStore: Send + Sync {
    // User operations
    fn find_user_by_username(&self, username: &str) -> Result<Option<User>>;
    fn find_user_by_id(&self, id: i64) -> Result<Option<User>>;
    /// Inserts a user. Fails with `Error::Conflict` when the username is taken.
    fn insert_user(&self, user: &NewUser) -> Result<User>;
    fn list_users(&self, after_id: i64, limit: i32) -> Result<Vec<User>>;
    fn update_user_password(&self, id: i64, password_hash: &str) -> Result<()>;
    fn update_user_admin(&self, id: i64, is_admin: bool) -> Result<()>;
    fn delete_user(&self, id: i64) -> Result<bool>;
    fn has_root_admin(&self) -> Result<bool>;

    // Permission operations
    fn find_permission(&self, resource_id: &str, user_id: i64)
    -> Result<Option<ResourcePermission>>;
    /// Insert-or-update keyed by (resource_id, user_id) in a single statement.
    fn upsert_permission(
        &self,
        resource_id: &str,
        user_id: i64,
        level: PermissionLevel,
    ) -> Result<ResourcePermission>;
    fn delete_permission(&self, resource_id: &str, user_id: i64) -> Result<bool>;
    fn list_permissions_for_resource(&self, resource_id: &str) -> Result<Vec<PermissionListing>>;
    fn list_permissions_for_user(&self, user_id: i64) -> Result<Vec<ResourcePermission>>;
}

/// SessionStore owns session rows.
pub trait SessionStore: Send + Sync {
    /// Fails with `Error::Conflict` if the digest already exists.
    fn insert_session(&self, session: &Session) -> Result<()>;
    fn find_session(&self, token_digest: &str) -> Result<Option<Session>>;
    fn delete_session(&self, token_digest: &str) -> Result<bool>;
    fn delete_expired_sessions(&self, now: DateTime<Utc>) -> Result<usize>;
}

/// ResourceCatalog is the host system's view of the resources grants refer to.
pub trait ResourceCatalog: Send + Sync {
    /// Fails with `Error::Conflict` when the name is taken.
    fn create_resource(&self, resource: &Resource) -> Result<()>;
    fn get_resource(&self, id: &str) -> Result<Option<Resource>>;
    fn list_resources(&self) -> Result<Vec<Resource>>;
    fn rename_resource(&self, id: &str, name: &str) -> Result<()>;
    /// Deletes the resource and every grant on it in one transaction.
    fn delete_resource(&self, id: &str) -> Result<bool>;

    /// Protected resources exist structurally and cannot be deleted by anyone.
    fn is_protected_resource(&self, id: &str) -> bool {
        id == DEFAULT_RESOURCE_ID
    }
}

/// Store bundles every persistence interface behind one backend.
pub trait Store: CredentialStore + SessionStore + ResourceCatalog {
    fn initialize(&self) -> Result<()>;
}
