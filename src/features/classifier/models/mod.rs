mod training_run;

pub use training_run::{TrainingRun, TrainingStatus};
