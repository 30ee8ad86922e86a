use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use uuid::Uuid;

use crate::core::error::Result;
use crate::features::auth::model::AuthenticatedUser;
use crate::features::notifications::dtos::{
    ListNotificationsQuery, MarkAllReadDto, NotificationResponseDto, UnreadCountDto,
};
use crate::features::notifications::services::NotificationService;
use crate::shared::types::{ApiResponse, Meta, PaginationQuery};

/// List the caller's notifications
#[utoipa::path(
    get,
    path = "/api/notifications",
    params(PaginationQuery, ListNotificationsQuery),
    responses(
        (status = 200, description = "List of notifications", body = ApiResponse<Vec<NotificationResponseDto>>),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "notifications"
)]
pub async fn list_notifications(
    user: AuthenticatedUser,
    State(service): State<Arc<NotificationService>>,
    Query(pagination): Query<PaginationQuery>,
    Query(query): Query<ListNotificationsQuery>,
) -> Result<Json<ApiResponse<Vec<NotificationResponseDto>>>> {
    let (notifications, total) = service
        .list(user.user_id, query.unread_only, &pagination)
        .await?;
    let dtos: Vec<NotificationResponseDto> = notifications.into_iter().map(|n| n.into()).collect();
    Ok(Json(ApiResponse::success(
        Some(dtos),
        None,
        Some(Meta::paged(total, &pagination)),
    )))
}

/// Count the caller's unread notifications
#[utoipa::path(
    get,
    path = "/api/notifications/unread-count",
    responses(
        (status = 200, description = "Unread count", body = ApiResponse<UnreadCountDto>),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "notifications"
)]
pub async fn unread_count(
    user: AuthenticatedUser,
    State(service): State<Arc<NotificationService>>,
) -> Result<Json<ApiResponse<UnreadCountDto>>> {
    let unread = service.unread_count(user.user_id).await?;
    Ok(Json(ApiResponse::success(
        Some(UnreadCountDto { unread }),
        None,
        None,
    )))
}

/// Mark one notification as read
#[utoipa::path(
    patch,
    path = "/api/notifications/{id}/read",
    params(
        ("id" = Uuid, Path, description = "Notification ID")
    ),
    responses(
        (status = 200, description = "Notification marked as read", body = ApiResponse<NotificationResponseDto>),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Notification not found")
    ),
    security(("bearer_auth" = [])),
    tag = "notifications"
)]
pub async fn mark_read(
    user: AuthenticatedUser,
    State(service): State<Arc<NotificationService>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<NotificationResponseDto>>> {
    let notification = service.mark_read(user.user_id, id).await?;
    Ok(Json(ApiResponse::success(
        Some(notification.into()),
        None,
        None,
    )))
}

/// Mark all of the caller's notifications as read
#[utoipa::path(
    post,
    path = "/api/notifications/read-all",
    responses(
        (status = 200, description = "Notifications marked as read", body = ApiResponse<MarkAllReadDto>),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "notifications"
)]
pub async fn mark_all_read(
    user: AuthenticatedUser,
    State(service): State<Arc<NotificationService>>,
) -> Result<Json<ApiResponse<MarkAllReadDto>>> {
    let updated = service.mark_all_read(user.user_id).await?;
    Ok(Json(ApiResponse::success(
        Some(MarkAllReadDto { updated }),
        None,
        None,
    )))
}
