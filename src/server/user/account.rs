use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

use crate::auth::CurrentSubject;
use crate::server::AppState;
use crate::server::dto::UpdatePasswordRequest;
use crate::server::response::{ApiError, ApiResponse};
use crate::types::{Subject, User};

pub async fn me(CurrentSubject(subject): CurrentSubject) -> Json<ApiResponse<Subject>> {
    Json(ApiResponse::success(subject))
}

/// Guarded as self-or-admin.
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(username): Path<String>,
) -> Result<Json<ApiResponse<User>>, ApiError> {
    let user = state.accounts.get_user(&username)?;
    Ok(Json(ApiResponse::success(user)))
}

pub async fn update_password(
    State(state): State<Arc<AppState>>,
    CurrentSubject(subject): CurrentSubject,
    Path(username): Path<String>,
    Json(req): Json<UpdatePasswordRequest>,
) -> Result<StatusCode, ApiError> {
    state
        .accounts
        .update_password(&username, &req.password, &subject)?;
    Ok(StatusCode::NO_CONTENT)
}
