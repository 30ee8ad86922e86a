//! Server-rendered map page. The browser side lives in `static/app.js` and talks
//! to the JSON API.

pub mod handlers;
pub mod routes;
pub mod services;

pub use services::PageService;
