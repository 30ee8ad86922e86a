pub mod classifier_dto;

pub use classifier_dto::*;
