use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use uuid::Uuid;

use crate::auth::CurrentSubject;
use crate::error::Error;
use crate::server::AppState;
use crate::server::dto::{CreateResourceRequest, RenameResourceRequest, ResourceResponse};
use crate::server::guard::CreatedResource;
use crate::server::response::{ApiError, ApiResponse, StoreOptionExt};
use crate::types::{Resource, Subject};
use crate::validation::validate_resource_name;

fn to_response(
    state: &AppState,
    subject: &Subject,
    resource: Resource,
) -> Result<ResourceResponse, ApiError> {
    let permission = state.resolver.effective_level(subject, &resource.id)?;
    Ok(ResourceResponse {
        id: resource.id,
        name: resource.name,
        created_at: resource.created_at,
        permission,
    })
}

/// Admin only. The guard grants the creator MANAGE once this succeeds.
pub async fn create_resource(
    State(state): State<Arc<AppState>>,
    CurrentSubject(subject): CurrentSubject,
    Json(req): Json<CreateResourceRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_resource_name(&req.name)?;

    let resource = Resource {
        id: Uuid::new_v4().to_string(),
        name: req.name,
        created_at: Utc::now(),
    };
    state.catalog.create_resource(&resource)?;
    tracing::info!(user = %subject.username, resource = %resource.id, "Created resource");

    let created = CreatedResource(resource.id.clone());
    let response = to_response(&state, &subject, resource)?;
    Ok((
        StatusCode::CREATED,
        Extension(created),
        Json(ApiResponse::success(response)),
    ))
}

/// Lists only what the caller can read.
pub async fn list_resources(
    State(state): State<Arc<AppState>>,
    CurrentSubject(subject): CurrentSubject,
) -> Result<Json<ApiResponse<Vec<ResourceResponse>>>, ApiError> {
    let resources = state.catalog.list_resources()?;
    let readable = state.resolver.filter_readable(&subject, resources)?;

    let responses = readable
        .into_iter()
        .map(|r| to_response(&state, &subject, r))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Json(ApiResponse::success(responses)))
}

pub async fn get_resource(
    State(state): State<Arc<AppState>>,
    CurrentSubject(subject): CurrentSubject,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<ResourceResponse>>, ApiError> {
    let resource = state
        .catalog
        .get_resource(&id)?
        .or_not_found("Resource not found")?;
    Ok(Json(ApiResponse::success(to_response(
        &state, &subject, resource,
    )?)))
}

pub async fn rename_resource(
    State(state): State<Arc<AppState>>,
    CurrentSubject(subject): CurrentSubject,
    Path(id): Path<String>,
    Json(req): Json<RenameResourceRequest>,
) -> Result<Json<ApiResponse<ResourceResponse>>, ApiError> {
    validate_resource_name(&req.name)?;
    state.catalog.rename_resource(&id, &req.name)?;

    let resource = state
        .catalog
        .get_resource(&id)?
        .or_not_found("Resource not found")?;
    Ok(Json(ApiResponse::success(to_response(
        &state, &subject, resource,
    )?)))
}

/// Protected resources are refused whatever the caller's rights.
pub async fn delete_resource(
    State(state): State<Arc<AppState>>,
    CurrentSubject(subject): CurrentSubject,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if state.catalog.is_protected_resource(&id) {
        return Err(Error::ProtectedResource(id).into());
    }

    if !state.catalog.delete_resource(&id)? {
        return Err(ApiError::not_found("Resource not found"));
    }

    tracing::info!(user = %subject.username, resource = %id, "Deleted resource");
    Ok(StatusCode::NO_CONTENT)
}
