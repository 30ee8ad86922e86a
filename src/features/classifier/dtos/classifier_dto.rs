use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::features::classifier::models::{TrainingRun, TrainingStatus};
use crate::features::classifier::network::Prediction;
use crate::features::classifier::services::ClassifierStatus;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LabelProbabilityDto {
    pub label: String,
    pub probability: f32,
}

/// Response DTO for a classification
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PredictionResponseDto {
    pub label: String,
    pub confidence: f32,
    /// Probabilities for every label, highest first
    pub probabilities: Vec<LabelProbabilityDto>,
}

impl From<Prediction> for PredictionResponseDto {
    fn from(p: Prediction) -> Self {
        let mut probabilities: Vec<LabelProbabilityDto> = p
            .probabilities
            .into_iter()
            .map(|(label, probability)| LabelProbabilityDto { label, probability })
            .collect();
        probabilities.sort_by(|a, b| b.probability.total_cmp(&a.probability));

        Self {
            label: p.label,
            confidence: p.confidence,
            probabilities,
        }
    }
}

/// Response DTO for training run
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TrainingRunResponseDto {
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

impl From<TrainingRun> for TrainingRunResponseDto {
    fn from(r: TrainingRun) -> Self {
        Self {
            id: r.id,
            status: r.status,
            triggered_by: r.triggered_by,
            labels: r.labels,
            sample_count: r.sample_count,
            epochs: r.epochs,
            final_loss: r.final_loss,
            train_accuracy: r.train_accuracy,
            error_message: r.error_message,
            started_at: r.started_at,
            finished_at: r.finished_at,
        }
    }
}

/// Response DTO for classifier status
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ClassifierStatusDto {
    pub model_loaded: bool,
    /// Output classes of the loaded model, in index order
    pub labels: Vec<String>,
    pub trained_at: Option<DateTime<Utc>>,
    pub image_size: Option<usize>,
    pub training_in_progress: bool,
    pub latest_run: Option<TrainingRunResponseDto>,
}

impl From<ClassifierStatus> for ClassifierStatusDto {
    fn from(s: ClassifierStatus) -> Self {
        Self {
            model_loaded: s.model.is_some(),
            labels: s
                .model
                .as_ref()
                .map(|m| m.labels().to_vec())
                .unwrap_or_default(),
            trained_at: s.model.as_ref().map(|m| m.trained_at()),
            image_size: s.model.as_ref().map(|m| m.image_size()),
            training_in_progress: s.training_in_progress,
            latest_run: s.latest_run.map(TrainingRunResponseDto::from),
        }
    }
}

/// Multipart form for classifying an image (Swagger UI documentation only)
#[derive(Debug, ToSchema)]
#[allow(dead_code)]
pub struct PredictImageDto {
    #[schema(format = Binary, content_media_type = "application/octet-stream")]
    pub image: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prediction_probabilities_sorted() {
        let dto = PredictionResponseDto::from(Prediction {
            label: "theft".to_string(),
            confidence: 0.7,
            probabilities: vec![
                ("arson".to_string(), 0.1),
                ("theft".to_string(), 0.7),
                ("vandalism".to_string(), 0.2),
            ],
        });

        let order: Vec<&str> = dto.probabilities.iter().map(|p| p.label.as_str()).collect();
        assert_eq!(order, vec!["theft", "vandalism", "arson"]);
    }

    #[test]
    fn test_status_without_model() {
        let dto = ClassifierStatusDto::from(ClassifierStatus {
            model: None,
            training_in_progress: false,
            latest_run: None,
        });
        assert!(!dto.model_loaded);
        assert!(dto.labels.is_empty());
        assert!(dto.trained_at.is_none());
    }
}
