use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// Database model for notification
#[derive(Debug, Clone, FromRow)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub incident_id: Option<Uuid>,
    pub title: String,
    pub body: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// Data for creating a notification
#[derive(Debug, Clone)]
pub struct CreateNotification {
    pub incident_id: Option<Uuid>,
    pub title: String,
    pub body: String,
}
