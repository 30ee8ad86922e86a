use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::features::incidents::models::{Incident, IncidentStatus, MapMarker};

/// Response DTO for incident
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct IncidentResponseDto {
    pub id: Uuid,
    pub reporter_id: Uuid,
    pub category_id: Option<Uuid>,
    pub incident_type: String,
    pub description: String,
    pub latitude: f64,
    pub longitude: f64,
    pub image_url: Option<String>,
    /// Label assigned by the classifier
    pub detected_type: Option<String>,
    pub detection_confidence: Option<f32>,
    pub status: IncidentStatus,
    pub occurred_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Incident> for IncidentResponseDto {
    fn from(i: Incident) -> Self {
        Self {
            id: i.id,
            reporter_id: i.reporter_id,
            category_id: i.category_id,
            incident_type: i.incident_type,
            description: i.description,
            latitude: i.latitude,
            longitude: i.longitude,
            image_url: i.image_url,
            detected_type: i.detected_type,
            detection_confidence: i.detection_confidence,
            status: i.status,
            occurred_at: i.occurred_at,
            created_at: i.created_at,
            updated_at: i.updated_at,
        }
    }
}

/// Multipart form for reporting an incident (Swagger UI documentation only)
#[derive(Debug, ToSchema)]
#[allow(dead_code)]
pub struct CreateIncidentDto {
    #[schema(example = 14.5995)]
    pub latitude: f64,
    #[schema(example = 120.9842)]
    pub longitude: f64,
    /// Category slug or free text. Falls back to the classifier's label.
    pub incident_type: Option<String>,
    pub description: String,
    /// RFC 3339 timestamp; defaults to now
    pub occurred_at: Option<String>,
    /// Optional photo (JPEG, PNG or WebP)
    #[schema(format = Binary, content_media_type = "application/octet-stream")]
    pub image: Option<String>,
}

/// Request DTO for editing an incident
///
/// Reporters may change their own incident while it is still `reported`.
/// Only admins may change `status`.
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateIncidentDto {
    #[validate(length(min = 1, max = 100, message = "Incident type must be 1-100 characters"))]
    pub incident_type: Option<String>,

    #[validate(length(min = 1, max = 2000, message = "Description must be 1-2000 characters"))]
    pub description: Option<String>,

    #[validate(range(min = -90.0, max = 90.0, message = "Latitude must be between -90 and 90"))]
    pub latitude: Option<f64>,

    #[validate(range(min = -180.0, max = 180.0, message = "Longitude must be between -180 and 180"))]
    pub longitude: Option<f64>,

    pub status: Option<IncidentStatus>,

    pub occurred_at: Option<DateTime<Utc>>,
}

impl UpdateIncidentDto {
    pub fn is_empty(&self) -> bool {
        self.incident_type.is_none()
            && self.description.is_none()
            && self.latitude.is_none()
            && self.longitude.is_none()
            && self.status.is_none()
            && self.occurred_at.is_none()
    }
}

/// Query params for listing incidents
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ListIncidentsQuery {
    /// Filter by incident type
    #[serde(rename = "type")]
    pub incident_type: Option<String>,
    pub status: Option<IncidentStatus>,
    /// Filter by category slug
    pub category: Option<String>,
    pub reporter_id: Option<Uuid>,
}

/// Query params for map markers
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct MarkersQuery {
    /// Only show incidents of this type
    #[serde(rename = "type")]
    pub incident_type: Option<String>,
}

/// Incident as shown on the public map
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MapMarkerDto {
    pub id: Uuid,
    pub latitude: f64,
    pub longitude: f64,
    pub incident_type: String,
    pub description: String,
    pub status: IncidentStatus,
    pub image_url: Option<String>,
    pub occurred_at: DateTime<Utc>,
    pub color: Option<String>,
}

impl From<MapMarker> for MapMarkerDto {
    fn from(m: MapMarker) -> Self {
        Self {
            id: m.id,
            latitude: m.latitude,
            longitude: m.longitude,
            incident_type: m.incident_type,
            description: m.description,
            status: m.status,
            image_url: m.image_url,
            occurred_at: m.occurred_at,
            color: m.color,
        }
    }
}
