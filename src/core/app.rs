//! Service wiring and the HTTP router.

use std::sync::Arc;

use axum::{extract::DefaultBodyLimit, middleware::from_fn_with_state, routing::get, Router};
use sqlx::PgPool;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::services::ServeDir;
use tower_http::trace::{DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::Level;
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use crate::core::config::Config;
use crate::core::error::Result;
use crate::core::middleware;
use crate::core::openapi::{ApiDoc, SwaggerInfoModifier};
use crate::features::admin::{routes as admin_routes, AdminService};
use crate::features::auth::{routes as auth_routes, AuthService, JwtManager};
use crate::features::categories::{routes as categories_routes, CategoryService};
use crate::features::classifier::{routes as classifier_routes, ClassifierService};
use crate::features::dataset::{routes as dataset_routes, DatasetService};
use crate::features::incidents::{routes as incidents_routes, IncidentService};
use crate::features::notifications::{routes as notifications_routes, NotificationService};
use crate::features::pages::{routes as pages_routes, PageService};
use crate::features::users::{routes as users_routes, UserService};
use crate::modules::storage::{LocalStorage, ObjectStorage};

/// Every service the router hands to its handlers
#[derive(Clone)]
pub struct AppState {
    pub jwt: Arc<JwtManager>,
    pub auth: Arc<AuthService>,
    pub users: Arc<UserService>,
    pub categories: Arc<CategoryService>,
    pub incidents: Arc<IncidentService>,
    pub notifications: Arc<NotificationService>,
    pub dataset: Arc<DatasetService>,
    pub classifier: Arc<ClassifierService>,
    pub admin: Arc<AdminService>,
    pub pages: Arc<PageService>,
}

impl AppState {
    pub async fn build(pool: PgPool, config: &Config) -> Result<Self> {
        let jwt = Arc::new(JwtManager::new(&config.auth));
        let users = Arc::new(UserService::new(pool.clone()));
        let auth = Arc::new(AuthService::new(
            pool.clone(),
            Arc::clone(&users),
            Arc::clone(&jwt),
        ));
        tracing::info!("Auth services initialized");

        let storage: Arc<dyn ObjectStorage> = Arc::new(LocalStorage::new(&config.storage).await?);

        let categories = Arc::new(CategoryService::new(pool.clone()));
        let notifications = Arc::new(NotificationService::new(pool.clone()));

        tokio::fs::create_dir_all(&config.classifier.dataset_dir).await?;
        if let Some(parent) = config.classifier.model_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let dataset = Arc::new(DatasetService::new(
            config.classifier.dataset_dir.clone(),
            Arc::clone(&categories),
        ));
        let classifier = Arc::new(ClassifierService::new(
            pool.clone(),
            config.classifier.clone(),
            Arc::clone(&dataset),
        ));
        tracing::info!(
            "Classifier services initialized (dataset at {})",
            config.classifier.dataset_dir.display()
        );

        let incidents = Arc::new(IncidentService::new(
            pool.clone(),
            Arc::clone(&storage),
            Arc::clone(&classifier),
            Arc::clone(&categories),
            Arc::clone(&notifications),
        ));
        let admin = Arc::new(AdminService::new(
            pool,
            storage,
            Arc::clone(&dataset),
            Arc::clone(&classifier),
        ));
        let pages = Arc::new(PageService::new(
            Arc::clone(&categories),
            config.map.clone(),
        )?);
        tracing::info!("Incident services initialized");

        Ok(Self {
            jwt,
            auth,
            users,
            categories,
            incidents,
            notifications,
            dataset,
            classifier,
            admin,
            pages,
        })
    }
}

async fn health_check() -> axum::http::StatusCode {
    axum::http::StatusCode::OK
}

pub fn build_router(state: &AppState, config: &Config) -> Router {
    let swagger_modifier = SwaggerInfoModifier {
        title: config.swagger.title.clone(),
        version: config.swagger.version.clone(),
        description: config.swagger.description.clone(),
    };

    let mut openapi = ApiDoc::openapi();
    swagger_modifier.modify(&mut openapi);

    let swagger = if let Some(credentials) = config.swagger.credentials() {
        tracing::info!("Swagger UI basic auth enabled");
        Router::new()
            .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi))
            .layer(from_fn_with_state(
                Arc::new(credentials),
                middleware::basic_auth_middleware,
            ))
    } else {
        tracing::info!("Swagger UI basic auth disabled (no credentials configured)");
        Router::new().merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi))
    };

    // Protected routes (require JWT authentication)
    let protected_routes = Router::new()
        .merge(auth_routes::protected_routes(Arc::clone(&state.auth)))
        .merge(users_routes::admin_routes(Arc::clone(&state.users)))
        .merge(categories_routes::admin_routes(Arc::clone(&state.categories)))
        .merge(incidents_routes::protected_routes(Arc::clone(&state.incidents)))
        .merge(notifications_routes::routes(Arc::clone(&state.notifications)))
        .merge(dataset_routes::admin_routes(Arc::clone(&state.dataset)))
        .merge(classifier_routes::routes(Arc::clone(&state.classifier)))
        .merge(classifier_routes::admin_routes(Arc::clone(&state.classifier)))
        .merge(admin_routes::routes(Arc::clone(&state.admin)))
        .route_layer(from_fn_with_state(
            Arc::clone(&state.jwt),
            middleware::auth_middleware,
        ));

    // Public routes (no auth required)
    let public_routes = Router::new()
        .merge(auth_routes::public_routes(Arc::clone(&state.auth)))
        .merge(categories_routes::routes(Arc::clone(&state.categories)))
        .merge(incidents_routes::routes(Arc::clone(&state.incidents)))
        .merge(pages_routes::routes(Arc::clone(&state.pages)))
        .route("/health", get(health_check))
        .nest_service("/static", ServeDir::new(&config.app.static_dir))
        .nest_service(
            &config.storage.url_prefix,
            ServeDir::new(&config.storage.upload_dir),
        );

    Router::new()
        .merge(swagger)
        .merge(protected_routes)
        .merge(public_routes)
        .layer(DefaultBodyLimit::max(config.app.max_request_body_size))
        .layer(middleware::cors_layer(
            config.app.cors_allowed_origins.clone(),
        ))
        // Propagate X-Request-Id to response headers
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(middleware::MakeSpanWithRequestId)
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        // Generate X-Request-Id using UUID v7 (or use client-provided one)
        .layer(SetRequestIdLayer::x_request_id(middleware::MakeRequestUuid))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::users::models::UserRole;
    use crate::shared::test_helpers::{lazy_pool, test_config};
    use axum::http::{header, StatusCode};
    use axum_test::TestServer;
    use serde_json::json;
    use uuid::Uuid;

    async fn server(root: &std::path::Path) -> (TestServer, AppState) {
        let config = test_config(root);
        let state = AppState::build(lazy_pool(), &config).await.unwrap();
        let server = TestServer::new(build_router(&state, &config)).unwrap();
        (server, state)
    }

    fn bearer(state: &AppState, role: UserRole) -> String {
        let token = state
            .jwt
            .issue_access_token(Uuid::new_v4(), "tester", role)
            .unwrap();
        format!("Bearer {}", token.token)
    }

    #[tokio::test]
    async fn test_health_has_request_id() {
        let dir = tempfile::tempdir().unwrap();
        let (server, _) = server(dir.path()).await;

        let response = server.get("/health").await;
        response.assert_status_ok();
        assert!(response.headers().get("x-request-id").is_some());
    }

    #[tokio::test]
    async fn test_protected_routes_require_token() {
        let dir = tempfile::tempdir().unwrap();
        let (server, _) = server(dir.path()).await;

        server
            .get("/api/auth/me")
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
        server
            .get("/api/incidents/mine")
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
        server
            .get("/api/notifications")
            .add_header(header::AUTHORIZATION, "Bearer not-a-jwt")
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_admin_routes_reject_reporters() {
        let dir = tempfile::tempdir().unwrap();
        let (server, state) = server(dir.path()).await;
        let token = bearer(&state, UserRole::Reporter);

        server
            .post("/api/admin/reset-db")
            .add_header(header::AUTHORIZATION, token.clone())
            .json(&json!({ "confirm": "RESET" }))
            .await
            .assert_status(StatusCode::FORBIDDEN);
        server
            .get("/api/admin/dataset")
            .add_header(header::AUTHORIZATION, token.clone())
            .await
            .assert_status(StatusCode::FORBIDDEN);
        server
            .post("/api/admin/classifier/train")
            .add_header(header::AUTHORIZATION, token)
            .await
            .assert_status(StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_reset_requires_confirmation() {
        let dir = tempfile::tempdir().unwrap();
        let (server, state) = server(dir.path()).await;

        server
            .post("/api/admin/reset-db")
            .add_header(header::AUTHORIZATION, bearer(&state, UserRole::Admin))
            .json(&json!({ "confirm": "yes please" }))
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_empty_incident_update_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let (server, state) = server(dir.path()).await;

        server
            .patch(&format!("/api/incidents/{}", Uuid::new_v4()))
            .add_header(header::AUTHORIZATION, bearer(&state, UserRole::Reporter))
            .json(&json!({}))
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_uploads_are_served() {
        let dir = tempfile::tempdir().unwrap();
        let (server, _) = server(dir.path()).await;
        std::fs::write(dir.path().join("uploads/hello.txt"), "hi").unwrap();

        let response = server.get("/uploads/hello.txt").await;
        response.assert_status_ok();
        response.assert_text("hi");
    }
}
