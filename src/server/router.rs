use std::sync::Arc;
use std::time::Instant;

use axum::extract::Request;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::{Router, routing::get};
use tower::ServiceBuilder;

use super::admin::admin_router;
use super::guard::authorize_request;
use super::response::ApiError;
use super::session::session_router;
use super::user::user_router;
use crate::accounts::Accounts;
use crate::auth::{Authenticator, CredentialVerifier, CsrfGuard, SessionManager};
use crate::authz::PermissionResolver;
use crate::clock::{Clock, SystemClock};
use crate::config::AuthConfig;
use crate::pipeline::{Pipeline, default_table};
use crate::store::{ResourceCatalog, Store};

pub struct AppState {
    pub config: AuthConfig,
    pub catalog: Arc<dyn ResourceCatalog>,
    pub sessions: Arc<SessionManager>,
    pub verifier: Arc<CredentialVerifier>,
    pub resolver: Arc<PermissionResolver>,
    pub accounts: Accounts,
    pub pipeline: Pipeline,
    pub csrf: CsrfGuard,
}

impl AppState {
    pub fn new<S: Store + 'static>(store: Arc<S>, config: AuthConfig) -> Self {
        Self::with_clock(store, config, Arc::new(SystemClock))
    }

    /// Wires every component to one store. Each one only sees the
    /// interface it needs.
    pub fn with_clock<S: Store + 'static>(
        store: Arc<S>,
        config: AuthConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let sessions = Arc::new(SessionManager::new(
            store.clone(),
            clock,
            config.session.lifetime(),
        ));
        let verifier = Arc::new(CredentialVerifier::new(store.clone()));
        let resolver = Arc::new(PermissionResolver::new(
            store.clone(),
            config.default_permission,
        ));
        let authenticator = Arc::new(Authenticator::new(
            store.clone(),
            verifier.clone(),
            sessions.clone(),
        ));
        let pipeline = Pipeline::new(authenticator, resolver.clone(), default_table());

        Self {
            catalog: store.clone(),
            accounts: Accounts::new(store),
            config,
            sessions,
            verifier,
            resolver,
            pipeline,
            csrf: CsrfGuard::new(),
        }
    }
}

async fn health() -> &'static str {
    "OK"
}

async fn not_found() -> impl IntoResponse {
    ApiError::not_found("Not found")
}

async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let response = next.run(request).await;

    let latency = start.elapsed();
    let status = response.status();

    tracing::info!(
        "{} {} {} {}ms",
        method,
        uri.path(),
        status.as_u16(),
        latency.as_millis()
    );

    response
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .merge(session_router())
        .nest("/api/v1/admin", admin_router())
        .nest("/api/v1", user_router())
        .fallback(not_found)
        .layer(
            ServiceBuilder::new()
                .layer(middleware::from_fn(log_request))
                .layer(middleware::from_fn_with_state(
                    state.clone(),
                    authorize_request,
                )),
        )
        .with_state(state)
}
