pub mod classifier_handler;

pub use classifier_handler::*;
