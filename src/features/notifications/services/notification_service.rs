use sqlx::PgPool;
use uuid::Uuid;

use crate::core::error::{AppError, Result};
use crate::features::notifications::models::{CreateNotification, Notification};
use crate::features::users::models::UserRole;
use crate::shared::types::PaginationQuery;

const NOTIFICATION_COLUMNS: &str = "id, user_id, incident_id, title, body, is_read, created_at";

/// Service for in-app notifications
pub struct NotificationService {
    pool: PgPool,
}

impl NotificationService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Notify a single user
    pub async fn notify(&self, user_id: Uuid, data: &CreateNotification) -> Result<Notification> {
        let notification = sqlx::query_as::<_, Notification>(&format!(
            r#"
            INSERT INTO notifications (user_id, incident_id, title, body)
            VALUES ($1, $2, $3, $4)
            RETURNING {NOTIFICATION_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(data.incident_id)
        .bind(&data.title)
        .bind(&data.body)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to create notification: {:?}", e);
            AppError::Database(e)
        })?;

        tracing::debug!("Notified user {}: {}", user_id, data.title);
        Ok(notification)
    }

    /// Notify every active admin. Returns how many notifications were created.
    pub async fn notify_admins(&self, data: &CreateNotification) -> Result<u64> {
        let result = sqlx::query(
            r#"
            INSERT INTO notifications (user_id, incident_id, title, body)
            SELECT id, $2, $3, $4
            FROM users
            WHERE role = $1 AND is_active = TRUE
            "#,
        )
        .bind(UserRole::Admin)
        .bind(data.incident_id)
        .bind(&data.title)
        .bind(&data.body)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to notify admins: {:?}", e);
            AppError::Database(e)
        })?;

        tracing::debug!("Notified {} admins: {}", result.rows_affected(), data.title);
        Ok(result.rows_affected())
    }

    /// A user's notifications, newest first
    pub async fn list(
        &self,
        user_id: Uuid,
        unread_only: bool,
        pagination: &PaginationQuery,
    ) -> Result<(Vec<Notification>, i64)> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND (NOT $2 OR is_read = FALSE)",
        )
        .bind(user_id)
        .bind(unread_only)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::Database)?;

        let notifications = sqlx::query_as::<_, Notification>(&format!(
            r#"
            SELECT {NOTIFICATION_COLUMNS}
            FROM notifications
            WHERE user_id = $1 AND (NOT $2 OR is_read = FALSE)
            ORDER BY created_at DESC
            LIMIT $3 OFFSET $4
            "#
        ))
        .bind(user_id)
        .bind(unread_only)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::Database)?;

        Ok((notifications, total))
    }

    pub async fn unread_count(&self, user_id: Uuid) -> Result<i64> {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND is_read = FALSE",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::Database)
    }

    /// Mark one of the user's notifications as read
    pub async fn mark_read(&self, user_id: Uuid, id: Uuid) -> Result<Notification> {
        sqlx::query_as::<_, Notification>(&format!(
            r#"
            UPDATE notifications
            SET is_read = TRUE
            WHERE id = $1 AND user_id = $2
            RETURNING {NOTIFICATION_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::Database)?
        .ok_or_else(|| AppError::NotFound(format!("Notification {} not found", id)))
    }

    /// Mark all of the user's notifications as read. Returns how many changed.
    pub async fn mark_all_read(&self, user_id: Uuid) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE notifications SET is_read = TRUE WHERE user_id = $1 AND is_read = FALSE",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(AppError::Database)?;

        Ok(result.rows_affected())
    }
}
