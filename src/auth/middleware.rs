use axum::{
    Json,
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::types::Subject;

/// The subject the request guard authenticated, threaded to handlers through
/// request extensions.
#[derive(Debug, Clone)]
pub struct CurrentSubject(pub Subject);

/// Raised only when a handler that needs a subject is mounted outside the
/// guard, so there is no challenge to offer.
#[derive(Debug)]
pub struct MissingSubject;

impl IntoResponse for MissingSubject {
    fn into_response(self) -> Response {
        let body = json!({ "data": null, "error": "Authentication required" });
        (StatusCode::UNAUTHORIZED, Json(body)).into_response()
    }
}

impl<S: Send + Sync> FromRequestParts<S> for CurrentSubject {
    type Rejection = MissingSubject;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentSubject>()
            .cloned()
            .ok_or(MissingSubject)
    }
}
