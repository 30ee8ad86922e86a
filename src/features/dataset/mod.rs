//! Training image dataset.
//!
//! Images live on disk as `DATASET_DIR/<label>/<file>`, one folder per label.
//! Labels are category slugs.
//!
//! ## Endpoints (admin only)
//!
//! | Method | Endpoint | Description |
//! |--------|----------|-------------|
//! | GET | `/api/admin/dataset` | Labels with image counts |
//! | POST | `/api/admin/dataset/{label}/images` | Add images (multipart) |
//! | DELETE | `/api/admin/dataset/{label}` | Delete a label |
//! | DELETE | `/api/admin/dataset/{label}/{file}` | Delete one image |
//! | GET | `/api/admin/dataset/export` | Download as zip |
//! | POST | `/api/admin/dataset/import` | Import a zip (multipart) |

pub mod dtos;
pub mod handlers;
pub mod routes;
pub mod services;

pub use services::DatasetService;
