use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::features::dataset::services::{AddImagesOutcome, ImportOutcome, LabelSummary};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LabelSummaryDto {
    pub label: String,
    pub image_count: usize,
}

impl From<LabelSummary> for LabelSummaryDto {
    fn from(s: LabelSummary) -> Self {
        Self {
            label: s.label,
            image_count: s.image_count,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DatasetSummaryDto {
    pub labels: Vec<LabelSummaryDto>,
    pub total_images: usize,
}

impl From<Vec<LabelSummary>> for DatasetSummaryDto {
    fn from(labels: Vec<LabelSummary>) -> Self {
        let total_images = labels.iter().map(|l| l.image_count).sum();
        Self {
            labels: labels.into_iter().map(LabelSummaryDto::from).collect(),
            total_images,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AddImagesResponseDto {
    pub label: String,
    /// Stored file names
    pub added: Vec<String>,
    /// Uploads that were not readable images
    pub skipped: Vec<String>,
}

impl AddImagesResponseDto {
    pub fn new(label: String, outcome: AddImagesOutcome) -> Self {
        Self {
            label,
            added: outcome.added,
            skipped: outcome.skipped,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ImportResponseDto {
    pub imported: usize,
    pub skipped: usize,
}

impl From<ImportOutcome> for ImportResponseDto {
    fn from(o: ImportOutcome) -> Self {
        Self {
            imported: o.imported,
            skipped: o.skipped,
        }
    }
}

/// Multipart form for adding training images (Swagger UI documentation only)
#[derive(Debug, ToSchema)]
#[allow(dead_code)]
pub struct UploadImagesDto {
    /// One or more image files, each sent as an `images` field
    #[schema(format = Binary, content_media_type = "application/octet-stream")]
    pub images: Vec<String>,
}

/// Multipart form for importing a dataset archive (Swagger UI documentation only)
#[derive(Debug, ToSchema)]
#[allow(dead_code)]
pub struct ImportDatasetDto {
    /// Zip archive with `label/file.ext` entries
    #[schema(format = Binary, content_media_type = "application/zip")]
    pub archive: String,
    /// "true" to clear the dataset before importing
    #[schema(example = "false")]
    pub replace: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_totals() {
        let dto = DatasetSummaryDto::from(vec![
            LabelSummary {
                label: "arson".to_string(),
                image_count: 3,
            },
            LabelSummary {
                label: "theft".to_string(),
                image_count: 4,
            },
        ]);
        assert_eq!(dto.total_images, 7);
        assert_eq!(dto.labels[1].label, "theft");
    }
}
