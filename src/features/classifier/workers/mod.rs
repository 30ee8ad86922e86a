mod trainer;

pub use trainer::{train_model, TrainedModel};
