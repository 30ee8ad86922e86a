//! Incident categories.
//!
//! A category's slug is also the classifier's class name and the name of its
//! folder in the training dataset, so slugs never change after creation.

pub mod dtos;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;

pub use services::CategoryService;
