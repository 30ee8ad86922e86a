use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Router,
};

use crate::features::dataset::handlers;
use crate::features::dataset::services::DatasetService;
use crate::shared::constants::MAX_ARCHIVE_SIZE;

/// Training dataset routes (admin only)
pub fn admin_routes(service: Arc<DatasetService>) -> Router {
    Router::new()
        .route("/api/admin/dataset", get(handlers::get_summary))
        .route("/api/admin/dataset/export", get(handlers::export_dataset))
        .route(
            "/api/admin/dataset/import",
            post(handlers::import_dataset).layer(DefaultBodyLimit::max(MAX_ARCHIVE_SIZE)),
        )
        .route("/api/admin/dataset/{label}", delete(handlers::delete_label))
        .route(
            "/api/admin/dataset/{label}/images",
            post(handlers::add_images),
        )
        .route(
            "/api/admin/dataset/{label}/{file}",
            delete(handlers::delete_image),
        )
        .with_state(service)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::categories::CategoryService;
    use crate::shared::test_helpers::{admin_user, lazy_pool, reporter_user, with_user};
    use axum::http::StatusCode;
    use axum_test::TestServer;

    fn server(root: &std::path::Path, user: crate::features::auth::model::AuthenticatedUser) -> TestServer {
        let categories = Arc::new(CategoryService::new(lazy_pool()));
        let service = Arc::new(DatasetService::new(root.to_path_buf(), categories));
        TestServer::new(with_user(admin_routes(service), user)).unwrap()
    }

    #[tokio::test]
    async fn test_dataset_is_admin_only() {
        let dir = tempfile::tempdir().unwrap();
        server(dir.path(), reporter_user())
            .get("/api/admin/dataset")
            .await
            .assert_status(StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_summary_and_label_deletion() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("theft")).unwrap();
        std::fs::write(dir.path().join("theft/a.png"), b"png").unwrap();
        let server = server(dir.path(), admin_user());

        let summary = server.get("/api/admin/dataset").await;
        summary.assert_status_ok();
        let body: serde_json::Value = summary.json();
        assert_eq!(body["data"]["total_images"], 1);

        server
            .delete("/api/admin/dataset/Not_A_Slug")
            .await
            .assert_status(StatusCode::BAD_REQUEST);
        server
            .delete("/api/admin/dataset/vandalism")
            .await
            .assert_status(StatusCode::NOT_FOUND);
        server
            .delete("/api/admin/dataset/theft")
            .await
            .assert_status_ok();
        assert!(!dir.path().join("theft").exists());
    }
}
