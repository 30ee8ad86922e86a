use std::sync::Arc;

use sqlx::PgPool;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use uuid::Uuid;

use crate::core::config::ClassifierConfig;
use crate::core::error::{AppError, Result};
use crate::features::classifier::models::{TrainingRun, TrainingStatus};
use crate::features::classifier::network::{ConvNet, Prediction};
use crate::features::classifier::preprocess::load_input;
use crate::features::classifier::workers::{train_model, TrainedModel};
use crate::features::dataset::DatasetService;
use crate::shared::types::PaginationQuery;

const RUN_COLUMNS: &str = "id, status, triggered_by, labels, sample_count, epochs, final_loss, train_accuracy, error_message, started_at, finished_at";

/// Snapshot of the classifier state
#[derive(Debug, Clone)]
pub struct ClassifierStatus {
    pub model: Option<Arc<ConvNet>>,
    pub training_in_progress: bool,
    pub latest_run: Option<TrainingRun>,
}

/// Owns the in-memory model and coordinates training
pub struct ClassifierService {
    pool: PgPool,
    config: ClassifierConfig,
    dataset: Arc<DatasetService>,
    model: Arc<RwLock<Option<Arc<ConvNet>>>>,
    training: Arc<Mutex<()>>,
}

impl ClassifierService {
    pub fn new(pool: PgPool, config: ClassifierConfig, dataset: Arc<DatasetService>) -> Self {
        Self {
            pool,
            config,
            dataset,
            model: Arc::new(RwLock::new(None)),
            training: Arc::new(Mutex::new(())),
        }
    }

    /// Load the saved model, if any. A missing or unreadable file leaves the
    /// classifier without a model.
    pub async fn load_saved_model(&self) -> bool {
        let path = self.config.model_path.clone();
        if !path.exists() {
            tracing::info!("No saved classifier at {}", path.display());
            return false;
        }

        match tokio::task::spawn_blocking(move || ConvNet::load(&path)).await {
            Ok(Ok(model)) => {
                tracing::info!(
                    "Loaded classifier with labels {:?} (trained {})",
                    model.labels(),
                    model.trained_at()
                );
                *self.model.write().await = Some(Arc::new(model));
                true
            }
            Ok(Err(e)) => {
                tracing::warn!("Ignoring unreadable classifier model: {}", e);
                false
            }
            Err(e) => {
                tracing::error!("Model loading task failed: {}", e);
                false
            }
        }
    }

    /// Runs still marked running were interrupted by a restart
    pub async fn fail_interrupted_runs(&self) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE training_runs
            SET status = $1, error_message = 'Interrupted by server restart', finished_at = NOW()
            WHERE status = $2
            "#,
        )
        .bind(TrainingStatus::Failed)
        .bind(TrainingStatus::Running)
        .execute(&self.pool)
        .await
        .map_err(AppError::Database)?;

        if result.rows_affected() > 0 {
            tracing::warn!(
                "Marked {} interrupted training runs as failed",
                result.rows_affected()
            );
        }
        Ok(result.rows_affected())
    }

    pub async fn current_model(&self) -> Option<Arc<ConvNet>> {
        self.model.read().await.clone()
    }

    /// Classify image bytes with the cached model.
    ///
    /// The image is always decoded, so unreadable data is an error even when
    /// no model is loaded. Returns `None` without a model.
    pub async fn classify(&self, bytes: Vec<u8>) -> Result<Option<Prediction>> {
        let model = self.current_model().await;
        let size = model
            .as_ref()
            .map_or(self.config.image_size, |m| m.image_size());

        tokio::task::spawn_blocking(move || {
            let input = load_input(&bytes, size)?;
            Ok(model.map(|m| m.classify(&input)))
        })
        .await
        .map_err(|e| AppError::Internal(format!("Classification task failed: {}", e)))?
    }

    /// Like [`classify`](Self::classify) but requires a loaded model
    pub async fn predict(&self, bytes: Vec<u8>) -> Result<Prediction> {
        self.classify(bytes).await?.ok_or_else(|| {
            AppError::ServiceUnavailable("No classifier model has been trained yet".to_string())
        })
    }

    /// Prediction to apply to an incident: only above the confidence threshold
    pub async fn detect(&self, bytes: Vec<u8>) -> Result<Option<Prediction>> {
        let min_confidence = self.config.min_confidence;
        Ok(self
            .classify(bytes)
            .await?
            .filter(|p| p.confidence >= min_confidence))
    }

    /// Start a background training run.
    ///
    /// Fails with a conflict while another run is in progress or when fewer
    /// than two labels have images. Inference keeps using the previous model
    /// until the new one is ready.
    pub async fn start_training(self: &Arc<Self>, triggered_by: Uuid) -> Result<TrainingRun> {
        let guard = self.lock_training()?;

        let labels = self.dataset.scan().await?;
        if labels.len() < 2 {
            return Err(AppError::Conflict(format!(
                "Training needs images for at least two labels, found {}",
                labels.len()
            )));
        }

        let label_names: Vec<String> = labels.iter().map(|l| l.label.clone()).collect();
        let image_count: usize = labels.iter().map(|l| l.paths.len()).sum();

        let run = sqlx::query_as::<_, TrainingRun>(&format!(
            r#"
            INSERT INTO training_runs (status, triggered_by, labels, sample_count, epochs)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {RUN_COLUMNS}
            "#
        ))
        .bind(TrainingStatus::Running)
        .bind(triggered_by)
        .bind(&label_names)
        .bind(image_count as i32)
        .bind(self.config.epochs as i32)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to record training run: {:?}", e);
            AppError::Database(e)
        })?;

        tracing::info!(
            "Training run {} started by {} on {} labels",
            run.id,
            triggered_by,
            label_names.len()
        );

        let service = Arc::clone(self);
        let run_id = run.id;
        tokio::spawn(async move {
            let _guard = guard;
            let config = service.config.clone();

            let outcome = tokio::task::spawn_blocking(move || train_model(&config, &labels))
                .await
                .unwrap_or_else(|e| Err(AppError::Internal(format!("Training task failed: {}", e))));

            if let Err(e) = service.finish_run(run_id, outcome).await {
                tracing::error!("Failed to finish training run {}: {:?}", run_id, e);
            }
        });

        Ok(run)
    }

    /// Take the single-flight training lock. No run can start while the guard
    /// is held; fails with a conflict while a run is in progress.
    pub fn lock_training(&self) -> Result<OwnedMutexGuard<()>> {
        Arc::clone(&self.training)
            .try_lock_owned()
            .map_err(|_| AppError::Conflict("Training is already in progress".to_string()))
    }

    async fn finish_run(&self, run_id: Uuid, outcome: Result<TrainedModel>) -> Result<()> {
        match outcome {
            Ok(trained) => {
                *self.model.write().await = Some(Arc::new(trained.model));

                sqlx::query(
                    r#"
                    UPDATE training_runs
                    SET status = $2, sample_count = $3, final_loss = $4, train_accuracy = $5,
                        finished_at = NOW()
                    WHERE id = $1
                    "#,
                )
                .bind(run_id)
                .bind(TrainingStatus::Completed)
                .bind(trained.sample_count as i32)
                .bind(trained.summary.final_loss)
                .bind(trained.summary.accuracy)
                .execute(&self.pool)
                .await?;

                tracing::info!("Training run {} completed", run_id);
            }
            Err(e) => {
                tracing::error!("Training run {} failed: {}", run_id, e);

                sqlx::query(
                    r#"
                    UPDATE training_runs
                    SET status = $2, error_message = $3, finished_at = NOW()
                    WHERE id = $1
                    "#,
                )
                .bind(run_id)
                .bind(TrainingStatus::Failed)
                .bind(e.to_string())
                .execute(&self.pool)
                .await?;
            }
        }
        Ok(())
    }

    pub async fn status(&self) -> Result<ClassifierStatus> {
        let latest_run = sqlx::query_as::<_, TrainingRun>(&format!(
            "SELECT {RUN_COLUMNS} FROM training_runs ORDER BY started_at DESC LIMIT 1"
        ))
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::Database)?;

        Ok(ClassifierStatus {
            model: self.current_model().await,
            training_in_progress: self.training.try_lock().is_err(),
            latest_run,
        })
    }

    pub async fn list_runs(&self, pagination: &PaginationQuery) -> Result<(Vec<TrainingRun>, i64)> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM training_runs")
            .fetch_one(&self.pool)
            .await
            .map_err(AppError::Database)?;

        let runs = sqlx::query_as::<_, TrainingRun>(&format!(
            r#"
            SELECT {RUN_COLUMNS}
            FROM training_runs
            ORDER BY started_at DESC
            LIMIT $1 OFFSET $2
            "#
        ))
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::Database)?;

        Ok((runs, total))
    }

    /// Drop the in-memory model and delete the saved file
    pub async fn discard_model(&self) -> Result<()> {
        *self.model.write().await = None;
        match tokio::fs::remove_file(&self.config.model_path).await {
            Ok(()) => tracing::info!("Deleted classifier model"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }
}
