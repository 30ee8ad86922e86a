use crate::features::users::handlers;
use crate::features::users::services::UserService;
use axum::{
    routing::{get, patch},
    Router,
};
use std::sync::Arc;

/// Admin routes for account management
pub fn admin_routes(service: Arc<UserService>) -> Router {
    Router::new()
        .route("/api/admin/users", get(handlers::list_users))
        .route("/api/admin/users/{id}", patch(handlers::update_user))
        .with_state(service)
}
