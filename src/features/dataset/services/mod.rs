pub mod dataset_service;

pub use dataset_service::{
    AddImagesOutcome, DatasetService, ImportOutcome, LabelImages, LabelSummary,
};
