mod users;

use std::sync::Arc;

use axum::{
    Router,
    routing::{delete, get, patch},
};

use crate::server::AppState;

pub fn admin_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/users", get(users::list_users).post(users::create_user))
        .route("/users/{id}", delete(users::delete_user))
        .route("/users/{id}/admin", patch(users::update_admin))
        .route("/users/{id}/permissions", get(users::list_user_permissions))
}
