use std::sync::Arc;

use axum::{
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};

use crate::core::error::{AppError, Result};
use crate::core::extractor::MultipartForm;
use crate::features::auth::guards::RequireAdmin;
use crate::features::dataset::dtos::{
    AddImagesResponseDto, DatasetSummaryDto, ImportDatasetDto, ImportResponseDto,
    UploadImagesDto,
};
use crate::features::dataset::services::DatasetService;
use crate::shared::constants::{MAX_ARCHIVE_SIZE, MAX_IMAGE_SIZE};
use crate::shared::types::ApiResponse;

/// Summarise the training dataset (admin only)
#[utoipa::path(
    get,
    path = "/api/admin/dataset",
    responses(
        (status = 200, description = "Labels with image counts", body = ApiResponse<DatasetSummaryDto>),
        (status = 403, description = "Forbidden - admin only")
    ),
    security(("bearer_auth" = [])),
    tag = "dataset"
)]
pub async fn get_summary(
    RequireAdmin(_admin): RequireAdmin,
    State(service): State<Arc<DatasetService>>,
) -> Result<Json<ApiResponse<DatasetSummaryDto>>> {
    let summary = service.summary().await?;
    Ok(Json(ApiResponse::success(Some(summary.into()), None, None)))
}

/// Add training images to a label (admin only)
///
/// Accepts multipart/form-data with one or more `images` file fields.
/// The label must be the slug of an active category.
#[utoipa::path(
    post,
    path = "/api/admin/dataset/{label}/images",
    params(
        ("label" = String, Path, description = "Category slug")
    ),
    request_body(
        content = UploadImagesDto,
        content_type = "multipart/form-data",
    ),
    responses(
        (status = 201, description = "Images stored", body = ApiResponse<AddImagesResponseDto>),
        (status = 400, description = "Invalid label or no images"),
        (status = 403, description = "Forbidden - admin only"),
        (status = 413, description = "Image too large")
    ),
    security(("bearer_auth" = [])),
    tag = "dataset"
)]
pub async fn add_images(
    RequireAdmin(_admin): RequireAdmin,
    State(service): State<Arc<DatasetService>>,
    Path(label): Path<String>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<ApiResponse<AddImagesResponseDto>>)> {
    let form = MultipartForm::read(multipart, MAX_IMAGE_SIZE).await?;
    let outcome = service.add_images(&label, form.files).await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(
            Some(AddImagesResponseDto::new(label, outcome)),
            None,
            None,
        )),
    ))
}

/// Delete a label folder and all its images (admin only)
#[utoipa::path(
    delete,
    path = "/api/admin/dataset/{label}",
    params(
        ("label" = String, Path, description = "Dataset label")
    ),
    responses(
        (status = 200, description = "Label deleted"),
        (status = 400, description = "Invalid label"),
        (status = 403, description = "Forbidden - admin only"),
        (status = 404, description = "Label not found")
    ),
    security(("bearer_auth" = [])),
    tag = "dataset"
)]
pub async fn delete_label(
    RequireAdmin(_admin): RequireAdmin,
    State(service): State<Arc<DatasetService>>,
    Path(label): Path<String>,
) -> Result<Json<ApiResponse<()>>> {
    service.delete_label(&label).await?;
    Ok(Json(ApiResponse::success(
        None,
        Some(format!("Label '{}' deleted", label)),
        None,
    )))
}

/// Delete one training image (admin only)
#[utoipa::path(
    delete,
    path = "/api/admin/dataset/{label}/{file}",
    params(
        ("label" = String, Path, description = "Dataset label"),
        ("file" = String, Path, description = "Image file name")
    ),
    responses(
        (status = 200, description = "Image deleted"),
        (status = 400, description = "Invalid label or file name"),
        (status = 403, description = "Forbidden - admin only"),
        (status = 404, description = "Image not found")
    ),
    security(("bearer_auth" = [])),
    tag = "dataset"
)]
pub async fn delete_image(
    RequireAdmin(_admin): RequireAdmin,
    State(service): State<Arc<DatasetService>>,
    Path((label, file)): Path<(String, String)>,
) -> Result<Json<ApiResponse<()>>> {
    service.delete_image(&label, &file).await?;
    Ok(Json(ApiResponse::success(
        None,
        Some("Image deleted".to_string()),
        None,
    )))
}

/// Download the dataset as a zip archive (admin only)
#[utoipa::path(
    get,
    path = "/api/admin/dataset/export",
    responses(
        (status = 200, description = "Zip archive with label/file entries", content_type = "application/zip"),
        (status = 403, description = "Forbidden - admin only")
    ),
    security(("bearer_auth" = [])),
    tag = "dataset"
)]
pub async fn export_dataset(
    RequireAdmin(_admin): RequireAdmin,
    State(service): State<Arc<DatasetService>>,
) -> Result<impl IntoResponse> {
    let archive = service.export_zip().await?;
    Ok((
        [
            (header::CONTENT_TYPE, "application/zip"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"dataset.zip\"",
            ),
        ],
        archive,
    ))
}

/// Import a zip archive into the dataset (admin only)
///
/// Accepts multipart/form-data with an `archive` file and an optional
/// `replace` flag that clears the dataset first.
#[utoipa::path(
    post,
    path = "/api/admin/dataset/import",
    request_body(
        content = ImportDatasetDto,
        content_type = "multipart/form-data",
    ),
    responses(
        (status = 200, description = "Archive imported", body = ApiResponse<ImportResponseDto>),
        (status = 400, description = "Missing or invalid archive"),
        (status = 403, description = "Forbidden - admin only"),
        (status = 413, description = "Archive too large")
    ),
    security(("bearer_auth" = [])),
    tag = "dataset"
)]
pub async fn import_dataset(
    RequireAdmin(_admin): RequireAdmin,
    State(service): State<Arc<DatasetService>>,
    multipart: Multipart,
) -> Result<Json<ApiResponse<ImportResponseDto>>> {
    let mut form = MultipartForm::read(multipart, MAX_ARCHIVE_SIZE).await?;
    let replace = form.parse::<bool>("replace")?.unwrap_or(false);
    let archive = form
        .take_file("archive")
        .ok_or_else(|| AppError::BadRequest("archive file is required".to_string()))?;

    let outcome = service.import_zip(archive.data, replace).await?;
    Ok(Json(ApiResponse::success(Some(outcome.into()), None, None)))
}
