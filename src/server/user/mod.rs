mod account;
mod permissions;
mod resources;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, patch},
};

use crate::server::AppState;

pub fn user_router() -> Router<Arc<AppState>> {
    Router::new()
        // Account routes
        .route("/me", get(account::me))
        .route("/users/{username}", get(account::get_user))
        .route("/users/{username}/password", patch(account::update_password))
        // Resource routes
        .route(
            "/resources",
            get(resources::list_resources).post(resources::create_resource),
        )
        .route(
            "/resources/{id}",
            get(resources::get_resource)
                .patch(resources::rename_resource)
                .delete(resources::delete_resource),
        )
        // Grant routes
        .route("/resources/{id}/permissions", get(permissions::list_permissions))
        .route(
            "/resources/{id}/permissions/{user_id}",
            get(permissions::get_permission)
                .put(permissions::put_permission)
                .delete(permissions::delete_permission),
        )
}
