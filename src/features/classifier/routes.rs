use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use crate::features::classifier::handlers;
use crate::features::classifier::services::ClassifierService;

/// Classification routes (require JWT authentication)
pub fn routes(service: Arc<ClassifierService>) -> Router {
    Router::new()
        .route("/api/classifier/predict", post(handlers::predict))
        .with_state(service)
}

/// Model management routes (admin only)
pub fn admin_routes(service: Arc<ClassifierService>) -> Router {
    Router::new()
        .route("/api/admin/classifier/status", get(handlers::get_status))
        .route("/api/admin/classifier/runs", get(handlers::list_runs))
        .route("/api/admin/classifier/train", post(handlers::start_training))
        .with_state(service)
}
