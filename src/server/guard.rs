use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};

use super::{AppState, response::ApiError};
use crate::auth::{Challenge, CurrentSubject, helpers};
use crate::pipeline::{Forwarded, Operation, Outcome, Rejection};

/// Set by creation handlers on their response so the guard can grant the
/// creator MANAGE on the new resource.
#[derive(Debug, Clone)]
pub struct CreatedResource(pub String);

/// Runs every request through the authorization pipeline before routing it
/// to a handler. The admitted subject reaches handlers as [`CurrentSubject`].
pub async fn authorize_request(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let headers = request.headers();
    let proof = helpers::proof_from_headers(headers, &state.config.session.cookie_name);
    let client = helpers::classify_client(headers);

    let method = request.method().clone();
    let uri = request.uri().clone();
    let op = Operation {
        method: &method,
        path: uri.path(),
        query: uri.query(),
    };

    let outcome = state
        .pipeline
        .run(&op, &proof, client, |subject| async move {
            if let Some(subject) = subject {
                request.extensions_mut().insert(CurrentSubject(subject));
            }

            let response = next.run(request).await;
            if !response.status().is_success() {
                return Err(response);
            }

            let created = response
                .extensions()
                .get::<CreatedResource>()
                .map(|c| c.0.clone());
            Ok(Forwarded {
                value: response,
                created_resource: created,
            })
        })
        .await;

    match outcome {
        Outcome::Completed(response) | Outcome::Failed(response) => response,
        Outcome::Rejected(rejection) => rejection_response(rejection),
    }
}

fn rejection_response(rejection: Rejection) -> Response {
    match rejection {
        Rejection::Unauthenticated(Challenge::RedirectToLogin { location }) => {
            Redirect::to(&location).into_response()
        }
        Rejection::Unauthenticated(Challenge::Unauthorized) => {
            ApiError::unauthorized("Authentication required").into_response()
        }
        Rejection::Forbidden(message) => ApiError::forbidden(message).into_response(),
        Rejection::BadRequest(message) => ApiError::bad_request(message).into_response(),
        Rejection::Internal(err) => ApiError::from(err).into_response(),
    }
}
