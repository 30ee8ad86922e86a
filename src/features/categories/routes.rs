use std::sync::Arc;

use axum::{
    routing::{get, post, put},
    Router,
};

use crate::features::categories::handlers;
use crate::features::categories::services::CategoryService;

/// Public category routes (no authentication required)
pub fn routes(service: Arc<CategoryService>) -> Router {
    Router::new()
        .route("/api/categories", get(handlers::list_categories))
        .route("/api/categories/{slug}", get(handlers::get_category))
        .with_state(service)
}

/// Category management routes (admin only)
pub fn admin_routes(service: Arc<CategoryService>) -> Router {
    Router::new()
        .route("/api/admin/categories", post(handlers::create_category))
        .route(
            "/api/admin/categories/{id}",
            put(handlers::update_category).delete(handlers::delete_category),
        )
        .with_state(service)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::test_helpers::{admin_user, lazy_pool, reporter_user, with_user};
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use serde_json::json;

    fn server(user: crate::features::auth::model::AuthenticatedUser) -> TestServer {
        let service = Arc::new(CategoryService::new(lazy_pool()));
        TestServer::new(with_user(admin_routes(service), user)).unwrap()
    }

    #[tokio::test]
    async fn test_reporters_cannot_create_categories() {
        let server = server(reporter_user());
        server
            .post("/api/admin/categories")
            .json(&json!({ "name": "Theft" }))
            .await
            .assert_status(StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_invalid_category_is_rejected_before_saving() {
        let server = server(admin_user());
        server
            .post("/api/admin/categories")
            .json(&json!({ "name": "Theft", "color": "red" }))
            .await
            .assert_status(StatusCode::BAD_REQUEST);
        server
            .post("/api/admin/categories")
            .json(&json!({ "name": "!!!" }))
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }
}
