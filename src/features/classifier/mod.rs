//! Incident photo classifier.
//!
//! A small convolutional network trained from the folder-per-label dataset.
//! The trained model is cached in memory and swapped atomically when a new
//! training run finishes; only one run may be in progress at a time.

pub mod dtos;
pub mod handlers;
pub mod models;
pub mod network;
pub mod preprocess;
pub mod routes;
pub mod services;
pub mod workers;

pub use services::ClassifierService;
