//! Storage module for uploaded files
//!
//! Provides the [`ObjectStorage`] abstraction and a local-disk implementation
//! served by the HTTP router.

mod local_storage;

pub use local_storage::{generate_key, LocalStorage, ObjectStorage};
