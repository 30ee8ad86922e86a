//! Incident reports.
//!
//! Reporters submit a location, a description and optionally a photo. The photo
//! is classified on upload; when the reporter gives no type the classifier's
//! label is used, falling back to `unclassified`. The incident is linked to the
//! active category whose slug matches its type.
//!
//! | Method | Path                     | Auth            |
//! |--------|--------------------------|-----------------|
//! | GET    | /api/incidents           | public          |
//! | GET    | /api/incidents/{id}      | public          |
//! | GET    | /api/incidents/heatmap   | public          |
//! | GET    | /api/incidents/markers   | public          |
//! | POST   | /api/incidents           | any user        |
//! | GET    | /api/incidents/mine      | any user        |
//! | PATCH  | /api/incidents/{id}      | owner or admin  |
//! | DELETE | /api/incidents/{id}      | owner or admin  |

pub mod dtos;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;

pub use services::IncidentService;
