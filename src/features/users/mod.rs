//! User accounts.
//!
//! ## Endpoints (admin only)
//!
//! | Method | Endpoint | Description |
//! |--------|----------|-------------|
//! | GET | `/api/admin/users` | List accounts |
//! | PATCH | `/api/admin/users/{id}` | Change role or active flag |

pub mod dtos;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;

pub use services::UserService;
