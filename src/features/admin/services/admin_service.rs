use std::sync::Arc;

use sqlx::PgPool;

use crate::core::error::{AppError, Result};
use crate::features::classifier::ClassifierService;
use crate::features::dataset::DatasetService;
use crate::modules::storage::ObjectStorage;

/// Rows removed by [`AdminService::reset_database`]
#[derive(Debug, Default)]
pub struct ResetOutcome {
    pub incidents: u64,
    pub notifications: u64,
    pub training_runs: u64,
    pub categories: u64,
    pub files_purged: bool,
}

/// Maintenance operations for administrators
pub struct AdminService {
    pool: PgPool,
    storage: Arc<dyn ObjectStorage>,
    dataset: Arc<DatasetService>,
    classifier: Arc<ClassifierService>,
}

impl AdminService {
    pub fn new(
        pool: PgPool,
        storage: Arc<dyn ObjectStorage>,
        dataset: Arc<DatasetService>,
        classifier: Arc<ClassifierService>,
    ) -> Self {
        Self {
            pool,
            storage,
            dataset,
            classifier,
        }
    }

    /// Delete all incidents, notifications, training runs and categories.
    ///
    /// Users and sessions are kept. With `purge_files` the incident photos,
    /// the training dataset and the saved model are removed too. Refused with
    /// a conflict while a training run is in progress.
    pub async fn reset_database(&self, purge_files: bool) -> Result<ResetOutcome> {
        // Held until the purge is done so no run can start or finish mid-reset
        let _training = self.classifier.lock_training()?;

        let mut tx = self.pool.begin().await?;

        let image_keys: Vec<String> =
            sqlx::query_scalar("SELECT image_key FROM incidents WHERE image_key IS NOT NULL")
                .fetch_all(&mut *tx)
                .await?;

        let notifications = delete_all(&mut tx, "notifications").await?;
        let incidents = delete_all(&mut tx, "incidents").await?;
        let training_runs = delete_all(&mut tx, "training_runs").await?;
        let categories = delete_all(&mut tx, "categories").await?;

        tx.commit().await.map_err(|e| {
            tracing::error!("Failed to commit database reset: {:?}", e);
            AppError::Database(e)
        })?;

        let mut outcome = ResetOutcome {
            incidents,
            notifications,
            training_runs,
            categories,
            files_purged: false,
        };

        tracing::warn!(
            "Database reset: {} incidents, {} notifications, {} training runs, {} categories removed",
            outcome.incidents,
            outcome.notifications,
            outcome.training_runs,
            outcome.categories
        );

        if purge_files {
            for key in &image_keys {
                if let Err(e) = self.storage.delete(key).await {
                    tracing::warn!("Failed to delete incident image {}: {:?}", key, e);
                }
            }
            self.dataset.clear().await?;
            self.classifier.discard_model().await?;
            outcome.files_purged = true;
            tracing::warn!(
                "Purged {} incident images, the dataset and the classifier model",
                image_keys.len()
            );
        }

        Ok(outcome)
    }
}

/// Incidents reference categories, so callers delete them first
async fn delete_all(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    table: &'static str,
) -> Result<u64> {
    let result = sqlx::query(&format!("DELETE FROM {table}"))
        .execute(&mut **tx)
        .await
        .map_err(|e| {
            tracing::error!("Failed to clear {}: {:?}", table, e);
            AppError::Database(e)
        })?;
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::app::AppState;
    use crate::shared::test_helpers::{lazy_pool, test_config};

    #[tokio::test]
    async fn test_reset_is_refused_while_training() {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::build(lazy_pool(), &test_config(dir.path()))
            .await
            .unwrap();

        let run_in_progress = state.classifier.lock_training().unwrap();
        let result = state.admin.reset_database(true).await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
        drop(run_in_progress);

        assert!(state.classifier.lock_training().is_ok());
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_reset_clears_incident_data(pool: PgPool) {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::build(pool.clone(), &test_config(dir.path()))
            .await
            .unwrap();

        sqlx::query("INSERT INTO categories (name, slug) VALUES ('Arson', 'arson')")
            .execute(&pool)
            .await
            .unwrap();
        let dataset_label = dir.path().join("training_data/arson");
        std::fs::create_dir_all(&dataset_label).unwrap();

        let outcome = state.admin.reset_database(true).await.unwrap();
        assert_eq!(outcome.categories, 1);
        assert!(outcome.files_purged);
        assert!(!dataset_label.exists());

        let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM categories")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(remaining, 0);
        assert!(state.classifier.lock_training().is_ok());
    }
}
