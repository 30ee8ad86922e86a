use sqlx::PgPool;
use uuid::Uuid;

use crate::core::database::map_db_error;
use crate::core::error::{AppError, Result};
use crate::features::users::models::{CreateUser, User, UserRole};
use crate::shared::types::PaginationQuery;

const USER_COLUMNS: &str =
    "id, username, email, password_hash, role, is_active, created_at, updated_at";

/// Service for user account operations
pub struct UserService {
    pool: PgPool,
}

impl UserService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a user. Duplicate usernames or emails are reported as a conflict.
    pub async fn create(&self, data: &CreateUser) -> Result<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (username, email, password_hash, role)
            VALUES ($1, $2, $3, $4)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&data.username)
        .bind(&data.email)
        .bind(&data.password_hash)
        .bind(data.role)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_db_error(e, "Username or email is already registered"))?;

        tracing::info!("Created user: {} ({}, role={})", user.id, user.username, user.role);
        Ok(user)
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<User> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to get user: {:?}", e);
                AppError::Database(e)
            })?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", id)))
    }

    /// Case-insensitive lookup by username
    pub async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE LOWER(username) = LOWER($1)"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to find user by username: {:?}", e);
            AppError::Database(e)
        })
    }

    pub async fn list(&self, pagination: &PaginationQuery) -> Result<(Vec<User>, i64)> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await
            .map_err(AppError::Database)?;

        let users = sqlx::query_as::<_, User>(&format!(
            r#"
            SELECT {USER_COLUMNS}
            FROM users
            ORDER BY created_at DESC
            LIMIT $1 OFFSET $2
            "#
        ))
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::Database)?;

        Ok((users, total))
    }

    /// Change role and/or active flag. `None` leaves the column unchanged.
    pub async fn update(
        &self,
        id: Uuid,
        role: Option<UserRole>,
        is_active: Option<bool>,
    ) -> Result<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET role = COALESCE($2, role),
                is_active = COALESCE($3, is_active),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(role)
        .bind(is_active)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::Database)?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", id)))?;

        tracing::info!(
            "Updated user {}: role={}, is_active={}",
            user.id,
            user.role,
            user.is_active
        );
        Ok(user)
    }
}
