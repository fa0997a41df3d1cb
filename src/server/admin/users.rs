use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::auth::CurrentSubject;
use crate::error::Error;
use crate::server::AppState;
use crate::server::dto::{CreateUserRequest, PaginationParams, UpdateAdminRequest};
use crate::server::response::{
    ApiError, ApiResponse, DEFAULT_PAGE_SIZE, PaginatedResponse, paginate,
};
use crate::types::{ResourcePermission, User};

pub async fn create_user(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .accounts
        .create_user(&req.username, &req.password, req.is_admin)?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(user))))
}

pub async fn list_users(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PaginationParams>,
) -> Result<Json<PaginatedResponse<User>>, ApiError> {
    let cursor = params.cursor.unwrap_or(0);

    let users = state.accounts.list_users(cursor, DEFAULT_PAGE_SIZE + 1)?;

    let (users, next_cursor, has_more) = paginate(users, DEFAULT_PAGE_SIZE as usize, |u| u.id);

    Ok(Json(PaginatedResponse::new(users, next_cursor, has_more)))
}

/// Deletion precedence is enforced by `Accounts::delete_user`.
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    CurrentSubject(actor): CurrentSubject,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.accounts.delete_user(id, &actor)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn update_admin(
    State(state): State<Arc<AppState>>,
    CurrentSubject(actor): CurrentSubject,
    Path(id): Path<i64>,
    Json(req): Json<UpdateAdminRequest>,
) -> Result<Json<ApiResponse<User>>, ApiError> {
    let user = state.accounts.set_admin(id, req.is_admin, &actor)?;
    Ok(Json(ApiResponse::success(user)))
}

pub async fn list_user_permissions(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<Vec<ResourcePermission>>>, ApiError> {
    let user = state
        .accounts
        .get_user_by_id(id)
        .map_err(|e| match e {
            Error::NotFound => ApiError::not_found("User not found"),
            other => other.into(),
        })?;
    let grants = state.resolver.list_user_permissions(user.id)?;
    Ok(Json(ApiResponse::success(grants)))
}
