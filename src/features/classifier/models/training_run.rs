use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use utoipa::ToSchema;
use uuid::Uuid;

/// Training run status enum matching database enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type, ToSchema)]
#[sqlx(type_name = "training_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TrainingStatus {
    Running,
    Completed,
    Failed,
}

/// Database model for a classifier training run
#[derive(Debug, Clone, FromRow)]
pub struct TrainingRun {
    pub id: Uuid,
    pub status: TrainingStatus,
    pub triggered_by: Option<Uuid>,
    pub labels: Vec<String>,
    pub sample_count: i32,
    pub epochs: i32,
    pub final_loss: Option<f32>,
    pub train_accuracy: Option<f32>,
    pub error_message: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}
