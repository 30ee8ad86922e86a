pub mod admin;
pub mod auth;
pub mod categories;
pub mod classifier;
pub mod dataset;
pub mod incidents;
pub mod notifications;
pub mod pages;
pub mod users;
