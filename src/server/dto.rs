use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::PermissionLevel;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
    /// Required for form posts, ignored for JSON.
    #[serde(default)]
    pub csrf_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginQuery {
    #[serde(default)]
    pub next: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub username: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub is_admin: bool,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePasswordRequest {
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateAdminRequest {
    pub is_admin: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct PaginationParams {
    #[serde(default)]
    pub cursor: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CreateResourceRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct RenameResourceRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct GrantRequest {
    pub level: PermissionLevel,
}

#[derive(Debug, Serialize)]
pub struct ResourceResponse {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    /// The caller's effective level, admins included.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permission: Option<PermissionLevel>,
}

#[derive(Debug, Serialize)]
pub struct GrantResponse {
    pub resource_id: String,
    pub user_id: i64,
    pub level: PermissionLevel,
    pub updated_at: DateTime<Utc>,
}
