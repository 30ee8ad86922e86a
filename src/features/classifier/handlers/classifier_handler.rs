use std::sync::Arc;

use axum::{
    extract::{Multipart, Query, State},
    http::StatusCode,
    Json,
};

use crate::core::error::{AppError, Result};
use crate::core::extractor::MultipartForm;
use crate::features::auth::guards::{RequireAdmin, RequireReporter};
use crate::features::classifier::dtos::{
    ClassifierStatusDto, PredictImageDto, PredictionResponseDto, TrainingRunResponseDto,
};
use crate::features::classifier::services::ClassifierService;
use crate::shared::constants::MAX_IMAGE_SIZE;
use crate::shared::types::{ApiResponse, Meta, PaginationQuery};

/// Classify an image with the current model
///
/// Accepts multipart/form-data with an `image` file.
#[utoipa::path(
    post,
    path = "/api/classifier/predict",
    request_body(
        content = PredictImageDto,
        content_type = "multipart/form-data",
    ),
    responses(
        (status = 200, description = "Prediction", body = ApiResponse<PredictionResponseDto>),
        (status = 400, description = "Missing or unreadable image"),
        (status = 401, description = "Unauthorized"),
        (status = 503, description = "No model trained yet")
    ),
    security(("bearer_auth" = [])),
    tag = "classifier"
)]
pub async fn predict(
    RequireReporter(_user): RequireReporter,
    State(service): State<Arc<ClassifierService>>,
    multipart: Multipart,
) -> Result<Json<ApiResponse<PredictionResponseDto>>> {
    let mut form = MultipartForm::read(multipart, MAX_IMAGE_SIZE).await?;
    let image = form
        .take_file("image")
        .ok_or_else(|| AppError::BadRequest("image file is required".to_string()))?;

    let prediction = service.predict(image.data).await?;
    Ok(Json(ApiResponse::success(
        Some(prediction.into()),
        None,
        None,
    )))
}

/// Classifier status (admin only)
#[utoipa::path(
    get,
    path = "/api/admin/classifier/status",
    responses(
        (status = 200, description = "Model and training status", body = ApiResponse<ClassifierStatusDto>),
        (status = 403, description = "Forbidden - admin only")
    ),
    security(("bearer_auth" = [])),
    tag = "classifier"
)]
pub async fn get_status(
    RequireAdmin(_admin): RequireAdmin,
    State(service): State<Arc<ClassifierService>>,
) -> Result<Json<ApiResponse<ClassifierStatusDto>>> {
    let status = service.status().await?;
    Ok(Json(ApiResponse::success(Some(status.into()), None, None)))
}

/// List training runs, newest first (admin only)
#[utoipa::path(
    get,
    path = "/api/admin/classifier/runs",
    params(PaginationQuery),
    responses(
        (status = 200, description = "Training runs", body = ApiResponse<Vec<TrainingRunResponseDto>>),
        (status = 403, description = "Forbidden - admin only")
    ),
    security(("bearer_auth" = [])),
    tag = "classifier"
)]
pub async fn list_runs(
    RequireAdmin(_admin): RequireAdmin,
    State(service): State<Arc<ClassifierService>>,
    Query(pagination): Query<PaginationQuery>,
) -> Result<Json<ApiResponse<Vec<TrainingRunResponseDto>>>> {
    let (runs, total) = service.list_runs(&pagination).await?;
    let dtos: Vec<TrainingRunResponseDto> = runs.into_iter().map(|r| r.into()).collect();
    Ok(Json(ApiResponse::success(
        Some(dtos),
        None,
        Some(Meta::paged(total, &pagination)),
    )))
}

/// Retrain the classifier from the dataset (admin only)
///
/// Training runs in the background; poll the status endpoint for the outcome.
#[utoipa::path(
    post,
    path = "/api/admin/classifier/train",
    responses(
        (status = 202, description = "Training started", body = ApiResponse<TrainingRunResponseDto>),
        (status = 403, description = "Forbidden - admin only"),
        (status = 409, description = "Training already running or not enough labels")
    ),
    security(("bearer_auth" = [])),
    tag = "classifier"
)]
pub async fn start_training(
    RequireAdmin(admin): RequireAdmin,
    State(service): State<Arc<ClassifierService>>,
) -> Result<(StatusCode, Json<ApiResponse<TrainingRunResponseDto>>)> {
    let run = service.start_training(admin.user_id).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(ApiResponse::success(
            Some(run.into()),
            Some("Training started".to_string()),
            None,
        )),
    ))
}
