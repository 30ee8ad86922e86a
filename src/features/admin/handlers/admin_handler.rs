use std::sync::Arc;

use axum::{extract::State, Json};

use crate::core::error::{AppError, Result};
use crate::core::extractor::AppJson;
use crate::features::admin::dtos::{ResetDatabaseDto, ResetResponseDto, RESET_CONFIRMATION};
use crate::features::admin::services::AdminService;
use crate::features::auth::guards::RequireAdmin;
use crate::shared::types::ApiResponse;

/// Wipe incident data (admin only)
///
/// Deletes incidents, notifications, training runs and categories. Accounts
/// survive. The body must contain `{"confirm": "RESET"}`.
#[utoipa::path(
    post,
    path = "/api/admin/reset-db",
    request_body = ResetDatabaseDto,
    responses(
        (status = 200, description = "Database reset", body = ApiResponse<ResetResponseDto>),
        (status = 400, description = "Missing confirmation"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - admin only"),
        (status = 409, description = "A training run is in progress")
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn reset_database(
    RequireAdmin(admin): RequireAdmin,
    State(service): State<Arc<AdminService>>,
    AppJson(dto): AppJson<ResetDatabaseDto>,
) -> Result<Json<ApiResponse<ResetResponseDto>>> {
    if !dto.is_confirmed() {
        return Err(AppError::BadRequest(format!(
            "Send {{\"confirm\": \"{}\"}} to reset the database",
            RESET_CONFIRMATION
        )));
    }

    tracing::warn!("Database reset requested by {}", admin.username);
    let outcome = service.reset_database(dto.purge_files).await?;

    Ok(Json(ApiResponse::success(
        Some(outcome.into()),
        Some("Database reset".to_string()),
        None,
    )))
}
