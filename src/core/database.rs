use crate::core::config::DatabaseConfig;
use crate::core::error::AppError;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;

pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
        .max_lifetime(Duration::from_secs(config.max_lifetime_secs))
        .connect(&config.url)
        .await
}

/// Convert a database error into a more specific AppError.
///
/// Unique violations (23505) become `Conflict` with the given message,
/// foreign key violations (23503) become `BadRequest`.
pub fn map_db_error(e: sqlx::Error, conflict_message: &str) -> AppError {
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.code().as_deref() == Some("23505") {
            return AppError::Conflict(conflict_message.to_string());
        }

        if db_err.code().as_deref() == Some("23503") {
            return AppError::BadRequest("Referenced record does not exist.".to_string());
        }
    }

    tracing::error!("Database error: {:?}", e);
    AppError::Database(e)
}
