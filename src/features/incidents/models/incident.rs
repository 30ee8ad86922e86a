use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use utoipa::ToSchema;
use uuid::Uuid;

/// Incident status enum matching database enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type, ToSchema)]
#[sqlx(type_name = "incident_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum IncidentStatus {
    /// Newly submitted, still editable by the reporter
    Reported,
    Verified,
    Resolved,
    Dismissed,
}

impl std::fmt::Display for IncidentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IncidentStatus::Reported => write!(f, "reported"),
            IncidentStatus::Verified => write!(f, "verified"),
            IncidentStatus::Resolved => write!(f, "resolved"),
            IncidentStatus::Dismissed => write!(f, "dismissed"),
        }
    }
}

/// Database model for incident
#[derive(Debug, Clone, FromRow)]
pub struct Incident {
    pub id: Uuid,
    pub reporter_id: Uuid,
    pub category_id: Option<Uuid>,
    pub incident_type: String,
    pub description: String,
    pub latitude: f64,
    pub longitude: f64,
    pub image_url: Option<String>,
    pub image_key: Option<String>,
    /// Label assigned by the classifier, if it was confident enough
    pub detected_type: Option<String>,
    pub detection_confidence: Option<f32>,
    pub status: IncidentStatus,
    pub occurred_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Data for inserting an incident
#[derive(Debug, Clone)]
pub struct CreateIncident {
    pub reporter_id: Uuid,
    pub category_id: Option<Uuid>,
    pub incident_type: String,
    pub description: String,
    pub latitude: f64,
    pub longitude: f64,
    pub image_url: Option<String>,
    pub image_key: Option<String>,
    pub detected_type: Option<String>,
    pub detection_confidence: Option<f32>,
    pub occurred_at: DateTime<Utc>,
}

/// Column changes for an incident. `None` leaves the column unchanged.
#[derive(Debug, Clone, Default)]
pub struct UpdateIncident {
    pub incident_type: Option<String>,
    /// `Some(x)` replaces the category, where `x` may be `None`
    pub category_id: Option<Option<Uuid>>,
    pub description: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub status: Option<IncidentStatus>,
    pub occurred_at: Option<DateTime<Utc>>,
}

/// Filters for listing incidents
#[derive(Debug, Clone, Default)]
pub struct IncidentFilter {
    pub incident_type: Option<String>,
    pub status: Option<IncidentStatus>,
    /// Category slug
    pub category: Option<String>,
    pub reporter_id: Option<Uuid>,
}

/// Row for the public map
#[derive(Debug, Clone, FromRow)]
pub struct MapMarker {
    pub id: Uuid,
    pub latitude: f64,
    pub longitude: f64,
    pub incident_type: String,
    pub description: String,
    pub status: IncidentStatus,
    pub image_url: Option<String>,
    pub occurred_at: DateTime<Utc>,
    /// Colour of the matched category
    pub color: Option<String>,
}
