//! Modules layer - Infrastructure components
//!
//! Contains adapters for infrastructure such as file storage.

pub mod storage;
