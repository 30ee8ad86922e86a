use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::core::error::{AppError, Result};
use crate::core::extractor::AppJson;
use crate::features::auth::guards::RequireAdmin;
use crate::features::categories::dtos::{
    CategoryResponseDto, CreateCategoryDto, ListCategoriesQuery, UpdateCategoryDto,
};
use crate::features::categories::models::{CreateCategory, UpdateCategory};
use crate::features::categories::services::CategoryService;
use crate::shared::types::{ApiResponse, Meta};
use crate::shared::validation::slugify;

/// List categories
#[utoipa::path(
    get,
    path = "/api/categories",
    params(ListCategoriesQuery),
    responses(
        (status = 200, description = "List of categories", body = ApiResponse<Vec<CategoryResponseDto>>),
    ),
    tag = "categories"
)]
pub async fn list_categories(
    State(service): State<Arc<CategoryService>>,
    Query(query): Query<ListCategoriesQuery>,
) -> Result<Json<ApiResponse<Vec<CategoryResponseDto>>>> {
    let categories: Vec<CategoryResponseDto> = service
        .list(query.include_inactive)
        .await?
        .into_iter()
        .map(CategoryResponseDto::from)
        .collect();

    let total = categories.len() as i64;
    Ok(Json(ApiResponse::success(
        Some(categories),
        None,
        Some(Meta::total(total)),
    )))
}

/// Get category by slug
#[utoipa::path(
    get,
    path = "/api/categories/{slug}",
    params(
        ("slug" = String, Path, description = "Category slug")
    ),
    responses(
        (status = 200, description = "Category found", body = ApiResponse<CategoryResponseDto>),
        (status = 404, description = "Category not found")
    ),
    tag = "categories"
)]
pub async fn get_category(
    State(service): State<Arc<CategoryService>>,
    Path(slug): Path<String>,
) -> Result<Json<ApiResponse<CategoryResponseDto>>> {
    let category = service.get_by_slug(&slug).await?;
    Ok(Json(ApiResponse::success(Some(category.into()), None, None)))
}

/// Create a category (admin only)
///
/// The slug is derived from the name when omitted.
#[utoipa::path(
    post,
    path = "/api/admin/categories",
    request_body = CreateCategoryDto,
    responses(
        (status = 201, description = "Category created", body = ApiResponse<CategoryResponseDto>),
        (status = 400, description = "Validation error"),
        (status = 403, description = "Forbidden - admin only"),
        (status = 409, description = "Name or slug already exists")
    ),
    security(("bearer_auth" = [])),
    tag = "categories"
)]
pub async fn create_category(
    RequireAdmin(_admin): RequireAdmin,
    State(service): State<Arc<CategoryService>>,
    AppJson(dto): AppJson<CreateCategoryDto>,
) -> Result<(StatusCode, Json<ApiResponse<CategoryResponseDto>>)> {
    dto.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let name = dto.name.trim().to_string();
    let slug = dto.slug.unwrap_or_else(|| slugify(&name));
    if slug.is_empty() {
        return Err(AppError::Validation(
            "Name must contain at least one letter or digit".to_string(),
        ));
    }

    let category = service
        .create(&CreateCategory {
            name,
            slug,
            description: dto.description,
            severity: dto.severity,
            color: dto.color,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(Some(category.into()), None, None)),
    ))
}

/// Update a category (admin only)
#[utoipa::path(
    put,
    path = "/api/admin/categories/{id}",
    params(
        ("id" = Uuid, Path, description = "Category ID")
    ),
    request_body = UpdateCategoryDto,
    responses(
        (status = 200, description = "Category updated", body = ApiResponse<CategoryResponseDto>),
        (status = 400, description = "Validation error"),
        (status = 403, description = "Forbidden - admin only"),
        (status = 404, description = "Category not found"),
        (status = 409, description = "Name already exists")
    ),
    security(("bearer_auth" = [])),
    tag = "categories"
)]
pub async fn update_category(
    RequireAdmin(_admin): RequireAdmin,
    State(service): State<Arc<CategoryService>>,
    Path(id): Path<Uuid>,
    AppJson(dto): AppJson<UpdateCategoryDto>,
) -> Result<Json<ApiResponse<CategoryResponseDto>>> {
    dto.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let category = service
        .update(
            id,
            &UpdateCategory {
                name: dto.name.map(|n| n.trim().to_string()),
                description: dto.description,
                severity: dto.severity,
                color: dto.color,
                is_active: dto.is_active,
            },
        )
        .await?;

    Ok(Json(ApiResponse::success(Some(category.into()), None, None)))
}

/// Soft-delete a category (admin only)
#[utoipa::path(
    delete,
    path = "/api/admin/categories/{id}",
    params(
        ("id" = Uuid, Path, description = "Category ID")
    ),
    responses(
        (status = 200, description = "Category deleted"),
        (status = 403, description = "Forbidden - admin only"),
        (status = 404, description = "Category not found")
    ),
    security(("bearer_auth" = [])),
    tag = "categories"
)]
pub async fn delete_category(
    RequireAdmin(_admin): RequireAdmin,
    State(service): State<Arc<CategoryService>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>> {
    service.delete(id).await?;
    Ok(Json(ApiResponse::success(
        None,
        Some("Category deleted".to_string()),
        None,
    )))
}
