use sqlx::PgPool;
use uuid::Uuid;

use crate::core::database::map_db_error;
use crate::core::error::{AppError, Result};
use crate::features::categories::models::{Category, CreateCategory, UpdateCategory};

const CATEGORY_COLUMNS: &str =
    "id, name, slug, description, severity, color, is_active, created_at, updated_at";

const DUPLICATE_CATEGORY: &str = "A category with this name or slug already exists";

/// Service for category operations
pub struct CategoryService {
    pool: PgPool,
}

impl CategoryService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// List categories ordered by name. Soft-deleted ones only when asked.
    pub async fn list(&self, include_inactive: bool) -> Result<Vec<Category>> {
        sqlx::query_as::<_, Category>(&format!(
            r#"
            SELECT {CATEGORY_COLUMNS}
            FROM categories
            WHERE is_active = TRUE OR $1
            ORDER BY name
            "#
        ))
        .bind(include_inactive)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to list categories: {:?}", e);
            AppError::Database(e)
        })
    }

    /// Get an active category by slug
    pub async fn get_by_slug(&self, slug: &str) -> Result<Category> {
        self.find_active_by_slug(slug)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Category '{}' not found", slug)))
    }

    pub async fn find_active_by_slug(&self, slug: &str) -> Result<Option<Category>> {
        sqlx::query_as::<_, Category>(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories WHERE slug = $1 AND is_active = TRUE"
        ))
        .bind(slug)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to get category by slug: {:?}", e);
            AppError::Database(e)
        })
    }

    pub async fn create(&self, data: &CreateCategory) -> Result<Category> {
        let category = sqlx::query_as::<_, Category>(&format!(
            r#"
            INSERT INTO categories (name, slug, description, severity, color)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {CATEGORY_COLUMNS}
            "#
        ))
        .bind(&data.name)
        .bind(&data.slug)
        .bind(&data.description)
        .bind(data.severity)
        .bind(&data.color)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_db_error(e, DUPLICATE_CATEGORY))?;

        tracing::info!("Created category: {} ({})", category.slug, category.id);
        Ok(category)
    }

    pub async fn update(&self, id: Uuid, data: &UpdateCategory) -> Result<Category> {
        let category = sqlx::query_as::<_, Category>(&format!(
            r#"
            UPDATE categories
            SET name = COALESCE($2, name),
                description = COALESCE($3, description),
                severity = COALESCE($4, severity),
                color = COALESCE($5, color),
                is_active = COALESCE($6, is_active),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {CATEGORY_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&data.name)
        .bind(&data.description)
        .bind(data.severity)
        .bind(&data.color)
        .bind(data.is_active)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_db_error(e, DUPLICATE_CATEGORY))?
        .ok_or_else(|| AppError::NotFound(format!("Category {} not found", id)))?;

        tracing::info!("Updated category: {} ({})", category.slug, category.id);
        Ok(category)
    }

    /// Soft delete. Incidents keep their reference; the slug stops being a valid label.
    pub async fn delete(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query(
            "UPDATE categories SET is_active = FALSE, updated_at = NOW() WHERE id = $1 AND is_active = TRUE",
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(AppError::Database)?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Category {} not found", id)));
        }

        tracing::info!("Deactivated category {}", id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::categories::models::CategorySeverity;

    fn category(name: &str, slug: &str) -> CreateCategory {
        CreateCategory {
            name: name.to_string(),
            slug: slug.to_string(),
            description: None,
            severity: CategorySeverity::Medium,
            color: None,
        }
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_duplicate_names_and_slugs_conflict(pool: PgPool) {
        let service = CategoryService::new(pool);
        let theft = service.create(&category("Theft", "theft")).await.unwrap();

        let same_name = service.create(&category("theft", "theft-2")).await;
        assert!(matches!(same_name, Err(AppError::Conflict(_))));

        let same_slug = service.create(&category("Petty Theft", "theft")).await;
        assert!(matches!(same_slug, Err(AppError::Conflict(_))));

        let flooding = service
            .create(&category("Flooding", "flooding"))
            .await
            .unwrap();
        let renamed = service
            .update(
                flooding.id,
                &UpdateCategory {
                    name: Some("THEFT".to_string()),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(renamed, Err(AppError::Conflict(_))));

        let all = service.list(true).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all.iter().filter(|c| c.id == theft.id).count(), 1);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_deleted_category_is_hidden(pool: PgPool) {
        let service = CategoryService::new(pool);
        let arson = service.create(&category("Arson", "arson")).await.unwrap();

        service.delete(arson.id).await.unwrap();
        assert!(service.find_active_by_slug("arson").await.unwrap().is_none());
        assert!(service.list(false).await.unwrap().is_empty());
        assert!(matches!(
            service.delete(arson.id).await,
            Err(AppError::NotFound(_))
        ));
    }
}
