use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::features::notifications::models::Notification;

/// Response DTO for notification
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NotificationResponseDto {
    pub id: Uuid,
    pub incident_id: Option<Uuid>,
    pub title: String,
    pub body: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

impl From<Notification> for NotificationResponseDto {
    fn from(n: Notification) -> Self {
        Self {
            id: n.id,
            incident_id: n.incident_id,
            title: n.title,
            body: n.body,
            is_read: n.is_read,
            created_at: n.created_at,
        }
    }
}

/// Query params for listing notifications
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ListNotificationsQuery {
    /// Only return unread notifications. Default: false
    #[serde(default)]
    pub unread_only: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UnreadCountDto {
    pub unread: i64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MarkAllReadDto {
    /// Number of notifications that were unread
    pub updated: u64,
}
