use std::sync::Arc;

use axum::{routing::post, Router};

use crate::features::admin::handlers;
use crate::features::admin::services::AdminService;

/// Maintenance routes (admin only)
pub fn routes(service: Arc<AdminService>) -> Router {
    Router::new()
        .route("/api/admin/reset-db", post(handlers::reset_database))
        .with_state(service)
}
