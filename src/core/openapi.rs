use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::features::admin::{dtos as admin_dtos, handlers as admin_handlers};
use crate::features::auth::{dtos as auth_dtos, handlers as auth_handlers};
use crate::features::categories::{dtos as categories_dtos, handlers as categories_handlers};
use crate::features::classifier::{dtos as classifier_dtos, handlers as classifier_handlers};
use crate::features::dataset::{dtos as dataset_dtos, handlers as dataset_handlers};
use crate::features::incidents::{dtos as incidents_dtos, handlers as incidents_handlers};
use crate::features::notifications::{
    dtos as notifications_dtos, handlers as notifications_handlers,
};
use crate::features::users::{dtos as users_dtos, handlers as users_handlers};
use crate::shared::types::{ApiResponse, Meta};

#[derive(OpenApi)]
#[openapi(
    paths(
        // Auth
        auth_handlers::register,
        auth_handlers::login,
        auth_handlers::refresh_token,
        auth_handlers::logout,
        auth_handlers::get_me,
        // Users (admin)
        users_handlers::list_users,
        users_handlers::update_user,
        // Categories
        categories_handlers::list_categories,
        categories_handlers::get_category,
        categories_handlers::create_category,
        categories_handlers::update_category,
        categories_handlers::delete_category,
        // Incidents
        incidents_handlers::create_incident,
        incidents_handlers::list_incidents,
        incidents_handlers::list_my_incidents,
        incidents_handlers::get_incident,
        incidents_handlers::update_incident,
        incidents_handlers::delete_incident,
        incidents_handlers::get_heatmap,
        incidents_handlers::get_markers,
        // Notifications
        notifications_handlers::list_notifications,
        notifications_handlers::unread_count,
        notifications_handlers::mark_read,
        notifications_handlers::mark_all_read,
        // Dataset (admin)
        dataset_handlers::get_summary,
        dataset_handlers::add_images,
        dataset_handlers::delete_label,
        dataset_handlers::delete_image,
        dataset_handlers::export_dataset,
        dataset_handlers::import_dataset,
        // Classifier
        classifier_handlers::predict,
        classifier_handlers::get_status,
        classifier_handlers::list_runs,
        classifier_handlers::start_training,
        // Admin
        admin_handlers::reset_database,
    ),
    components(
        schemas(
            // Shared
            Meta,
            // Auth
            ApiResponse<auth_dtos::AuthResponseDto>,
            // Users
            ApiResponse<users_dtos::UserResponseDto>,
            ApiResponse<Vec<users_dtos::UserResponseDto>>,
            // Categories
            ApiResponse<Vec<categories_dtos::CategoryResponseDto>>,
            ApiResponse<categories_dtos::CategoryResponseDto>,
            // Incidents
            incidents_dtos::CreateIncidentDto,
            ApiResponse<incidents_dtos::IncidentResponseDto>,
            ApiResponse<Vec<incidents_dtos::IncidentResponseDto>>,
            ApiResponse<Vec<incidents_dtos::MapMarkerDto>>,
            // Notifications
            ApiResponse<Vec<notifications_dtos::NotificationResponseDto>>,
            ApiResponse<notifications_dtos::NotificationResponseDto>,
            ApiResponse<notifications_dtos::UnreadCountDto>,
            ApiResponse<notifications_dtos::MarkAllReadDto>,
            // Dataset
            dataset_dtos::UploadImagesDto,
            dataset_dtos::ImportDatasetDto,
            ApiResponse<dataset_dtos::DatasetSummaryDto>,
            ApiResponse<dataset_dtos::AddImagesResponseDto>,
            ApiResponse<dataset_dtos::ImportResponseDto>,
            // Classifier
            classifier_dtos::PredictImageDto,
            ApiResponse<classifier_dtos::PredictionResponseDto>,
            ApiResponse<classifier_dtos::ClassifierStatusDto>,
            ApiResponse<classifier_dtos::TrainingRunResponseDto>,
            ApiResponse<Vec<classifier_dtos::TrainingRunResponseDto>>,
            // Admin
            ApiResponse<admin_dtos::ResetResponseDto>,
        )
    ),
    tags(
        (name = "auth", description = "Registration, login and token refresh"),
        (name = "users", description = "Account management (admin only)"),
        (name = "categories", description = "Incident categories"),
        (name = "incidents", description = "Incident reports and map data"),
        (name = "notifications", description = "In-app notifications"),
        (name = "dataset", description = "Classifier training images (admin only)"),
        (name = "classifier", description = "Image classification and training"),
        (name = "admin", description = "Maintenance endpoints (admin only)"),
    ),
    modifiers(&SecurityAddon),
    info(
        title = "Bantay API",
        version = "0.1.0",
        description = "API documentation for Bantay",
    )
)]
pub struct ApiDoc;

/// Adds Bearer JWT security scheme to OpenAPI spec
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Modifier to override OpenAPI info from config
pub struct SwaggerInfoModifier {
    pub title: String,
    pub version: String,
    pub description: String,
}

impl Modify for SwaggerInfoModifier {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        openapi.info.title = self.title.clone();
        openapi.info.version = self.version.clone();
        openapi.info.description = Some(self.description.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_lists_incident_paths_and_bearer_scheme() {
        let doc = ApiDoc::openapi();

        assert!(doc.paths.paths.contains_key("/api/incidents"));
        assert!(doc.paths.paths.contains_key("/api/incidents/heatmap"));
        assert!(doc.paths.paths.contains_key("/api/admin/reset-db"));
        assert!(doc
            .components
            .as_ref()
            .is_some_and(|c| c.security_schemes.contains_key("bearer_auth")));
    }

    #[test]
    fn test_info_modifier_overrides_title() {
        let mut doc = ApiDoc::openapi();
        SwaggerInfoModifier {
            title: "Test".to_string(),
            version: "9.9.9".to_string(),
            description: "desc".to_string(),
        }
        .modify(&mut doc);

        assert_eq!(doc.info.title, "Test");
        assert_eq!(doc.info.version, "9.9.9");
    }
}
