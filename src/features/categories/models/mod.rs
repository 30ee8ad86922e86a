mod category;

pub use category::{Category, CategorySeverity, CreateCategory, UpdateCategory};
