//! In-app notifications.
//!
//! Admins are notified of new incidents; reporters are notified when an admin
//! changes the status of their incident.

pub mod dtos;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;

pub use services::NotificationService;
