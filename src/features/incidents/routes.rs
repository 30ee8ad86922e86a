use std::sync::Arc;

use axum::{
    routing::{get, patch, post},
    Router,
};

use crate::features::incidents::handlers;
use crate::features::incidents::services::IncidentService;

/// Public incident routes: listing and the map feeds
pub fn routes(service: Arc<IncidentService>) -> Router {
    Router::new()
        .route("/api/incidents", get(handlers::list_incidents))
        .route("/api/incidents/heatmap", get(handlers::get_heatmap))
        .route("/api/incidents/markers", get(handlers::get_markers))
        .route("/api/incidents/{id}", get(handlers::get_incident))
        .with_state(service)
}

/// Incident routes that require JWT authentication
pub fn protected_routes(service: Arc<IncidentService>) -> Router {
    Router::new()
        .route("/api/incidents", post(handlers::create_incident))
        .route("/api/incidents/mine", get(handlers::list_my_incidents))
        .route(
            "/api/incidents/{id}",
            patch(handlers::update_incident).delete(handlers::delete_incident),
        )
        .with_state(service)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::auth::model::AuthenticatedUser;
    use crate::features::categories::CategoryService;
    use crate::features::classifier::ClassifierService;
    use crate::features::dataset::DatasetService;
    use crate::features::notifications::NotificationService;
    use crate::modules::storage::{LocalStorage, ObjectStorage};
    use crate::shared::test_helpers::{lazy_pool, reporter_user, test_config, with_user};
    use axum::http::StatusCode;
    use axum_test::multipart::{MultipartForm, Part};
    use axum_test::TestServer;

    async fn service(root: &std::path::Path) -> Arc<IncidentService> {
        let config = test_config(root);
        let pool = lazy_pool();
        let storage: Arc<dyn ObjectStorage> =
            Arc::new(LocalStorage::new(&config.storage).await.unwrap());
        let categories = Arc::new(CategoryService::new(pool.clone()));
        let dataset = Arc::new(DatasetService::new(
            config.classifier.dataset_dir.clone(),
            Arc::clone(&categories),
        ));
        let classifier = Arc::new(ClassifierService::new(
            pool.clone(),
            config.classifier.clone(),
            dataset,
        ));
        let notifications = Arc::new(NotificationService::new(pool.clone()));
        Arc::new(IncidentService::new(
            pool,
            storage,
            classifier,
            categories,
            notifications,
        ))
    }

    fn server(service: Arc<IncidentService>, user: Option<AuthenticatedUser>) -> TestServer {
        let router = protected_routes(service);
        let router = match user {
            Some(user) => with_user(router, user),
            None => router,
        };
        TestServer::new(router).unwrap()
    }

    #[tokio::test]
    async fn test_reporting_requires_a_user() {
        let dir = tempfile::tempdir().unwrap();
        let server = server(service(dir.path()).await, None);

        server
            .post("/api/incidents")
            .multipart(MultipartForm::new().add_text("description", "Broken streetlight"))
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_report_form_is_validated() {
        let dir = tempfile::tempdir().unwrap();
        let server = server(service(dir.path()).await, Some(reporter_user()));

        // Missing coordinates
        server
            .post("/api/incidents")
            .multipart(MultipartForm::new().add_text("description", "Broken streetlight"))
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        // Latitude out of range
        server
            .post("/api/incidents")
            .multipart(
                MultipartForm::new()
                    .add_text("latitude", "91")
                    .add_text("longitude", "120.98")
                    .add_text("description", "Broken streetlight"),
            )
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        // Attachment that is not an image
        server
            .post("/api/incidents")
            .multipart(
                MultipartForm::new()
                    .add_text("latitude", "14.5995")
                    .add_text("longitude", "120.9842")
                    .add_text("description", "Broken streetlight")
                    .add_part(
                        "image",
                        Part::bytes(b"definitely not a picture".to_vec())
                            .file_name("photo.jpg")
                            .mime_type("image/jpeg"),
                    ),
            )
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }
}
