use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use uuid::Uuid;

use crate::core::error::{AppError, Result};
use crate::core::extractor::AppJson;
use crate::features::auth::guards::RequireAdmin;
use crate::features::users::dtos::{UpdateUserDto, UserResponseDto};
use crate::features::users::models::UserRole;
use crate::features::users::services::UserService;
use crate::shared::types::{ApiResponse, Meta, PaginationQuery};

/// List all user accounts (admin only)
#[utoipa::path(
    get,
    path = "/api/admin/users",
    params(PaginationQuery),
    responses(
        (status = 200, description = "List of users", body = ApiResponse<Vec<UserResponseDto>>),
        (status = 403, description = "Forbidden - admin only")
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn list_users(
    RequireAdmin(_admin): RequireAdmin,
    State(service): State<Arc<UserService>>,
    Query(pagination): Query<PaginationQuery>,
) -> Result<Json<ApiResponse<Vec<UserResponseDto>>>> {
    let (users, total) = service.list(&pagination).await?;
    let dtos: Vec<UserResponseDto> = users.into_iter().map(UserResponseDto::from).collect();
    Ok(Json(ApiResponse::success(
        Some(dtos),
        None,
        Some(Meta::paged(total, &pagination)),
    )))
}

/// Change a user's role or active flag (admin only)
///
/// Admins cannot demote or deactivate their own account.
#[utoipa::path(
    patch,
    path = "/api/admin/users/{id}",
    params(
        ("id" = Uuid, Path, description = "User ID")
    ),
    request_body = UpdateUserDto,
    responses(
        (status = 200, description = "User updated", body = ApiResponse<UserResponseDto>),
        (status = 400, description = "Attempt to demote or deactivate self"),
        (status = 403, description = "Forbidden - admin only"),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn update_user(
    RequireAdmin(admin): RequireAdmin,
    State(service): State<Arc<UserService>>,
    Path(id): Path<Uuid>,
    AppJson(dto): AppJson<UpdateUserDto>,
) -> Result<Json<ApiResponse<UserResponseDto>>> {
    if dto.role.is_none() && dto.is_active.is_none() {
        return Err(AppError::Validation(
            "Provide at least one of role or is_active".to_string(),
        ));
    }

    let demotes_self = dto.role.is_some_and(|r| r != UserRole::Admin);
    let deactivates_self = dto.is_active == Some(false);
    if id == admin.user_id && (demotes_self || deactivates_self) {
        return Err(AppError::BadRequest(
            "Admins cannot demote or deactivate their own account".to_string(),
        ));
    }

    let user = service.update(id, dto.role, dto.is_active).await?;
    Ok(Json(ApiResponse::success(Some(user.into()), None, None)))
}
