use std::sync::Arc;

use axum::{routing::get, Router};

use crate::features::pages::handlers;
use crate::features::pages::services::PageService;

/// Server-rendered pages
pub fn routes(service: Arc<PageService>) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .with_state(service)
}
