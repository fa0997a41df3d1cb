use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

use crate::error::Error;
use crate::server::AppState;
use crate::server::dto::{GrantRequest, GrantResponse};
use crate::server::response::{ApiError, ApiResponse, StoreOptionExt};
use crate::types::{PermissionListing, ResourcePermission};

// All routes here are guarded by MANAGE on the resource.

fn grant_to_response(grant: ResourcePermission) -> GrantResponse {
    GrantResponse {
        resource_id: grant.resource_id,
        user_id: grant.user_id,
        level: grant.level,
        updated_at: grant.updated_at,
    }
}

fn require_resource(state: &AppState, id: &str) -> Result<(), ApiError> {
    state
        .catalog
        .get_resource(id)?
        .or_not_found("Resource not found")?;
    Ok(())
}

pub async fn list_permissions(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Vec<PermissionListing>>>, ApiError> {
    require_resource(&state, &id)?;
    let listing = state.resolver.list_permissions(&id)?;
    Ok(Json(ApiResponse::success(listing)))
}

pub async fn get_permission(
    State(state): State<Arc<AppState>>,
    Path((id, user_id)): Path<(String, i64)>,
) -> Result<Json<ApiResponse<GrantResponse>>, ApiError> {
    let grant = state
        .resolver
        .get_grant(&id, user_id)
        .map_err(|e| match e {
            Error::NotFound => ApiError::not_found("Permission not found"),
            other => other.into(),
        })?;
    Ok(Json(ApiResponse::success(grant_to_response(grant))))
}

/// Creates or replaces the grant for one user.
pub async fn put_permission(
    State(state): State<Arc<AppState>>,
    Path((id, user_id)): Path<(String, i64)>,
    Json(req): Json<GrantRequest>,
) -> Result<Json<ApiResponse<GrantResponse>>, ApiError> {
    require_resource(&state, &id)?;
    let grant = state
        .resolver
        .grant(&id, user_id, req.level)
        .map_err(|e| match e {
            Error::NotFound => ApiError::not_found("User not found"),
            other => other.into(),
        })?;
    Ok(Json(ApiResponse::success(grant_to_response(grant))))
}

pub async fn delete_permission(
    State(state): State<Arc<AppState>>,
    Path((id, user_id)): Path<(String, i64)>,
) -> Result<StatusCode, ApiError> {
    state.resolver.revoke(&id, user_id).map_err(|e| match e {
        Error::NotFound => ApiError::not_found("Permission not found"),
        other => other.into(),
    })?;
    Ok(StatusCode::NO_CONTENT)
}
