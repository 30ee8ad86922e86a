use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::features::admin::services::ResetOutcome;

/// Word that must be sent to confirm a database reset
pub const RESET_CONFIRMATION: &str = "RESET";

/// Request DTO for wiping incident data
#[derive(Debug, Deserialize, ToSchema)]
pub struct ResetDatabaseDto {
    /// Must be exactly `RESET`
    #[schema(example = "RESET")]
    pub confirm: String,

    /// Also delete uploaded incident photos, the training dataset and the saved model
    #[serde(default)]
    pub purge_files: bool,
}

impl ResetDatabaseDto {
    pub fn is_confirmed(&self) -> bool {
        self.confirm == RESET_CONFIRMATION
    }
}

/// Rows removed by a reset
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ResetResponseDto {
    pub incidents: u64,
    pub notifications: u64,
    pub training_runs: u64,
    pub categories: u64,
    pub files_purged: bool,
}

impl From<ResetOutcome> for ResetResponseDto {
    fn from(o: ResetOutcome) -> Self {
        Self {
            incidents: o.incidents,
            notifications: o.notifications,
            training_runs: o.training_runs,
            categories: o.categories,
            files_purged: o.files_purged,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confirmation_is_exact() {
        let dto: ResetDatabaseDto = serde_json::from_str(r#"{"confirm": "RESET"}"#).unwrap();
        assert!(dto.is_confirmed());
        assert!(!dto.purge_files);

        let dto: ResetDatabaseDto =
            serde_json::from_str(r#"{"confirm": "reset", "purge_files": true}"#).unwrap();
        assert!(!dto.is_confirmed());
        assert!(dto.purge_files);
    }
}
