use std::sync::Arc;

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use uuid::Uuid;
use validator::Validate;

use crate::core::error::{AppError, Result};
use crate::core::extractor::{AppJson, MultipartForm};
use crate::features::auth::guards::RequireReporter;
use crate::features::auth::model::AuthenticatedUser;
use crate::features::incidents::dtos::{
    CreateIncidentDto, IncidentResponseDto, ListIncidentsQuery, MapMarkerDto, MarkersQuery,
    UpdateIncidentDto,
};
use crate::features::incidents::models::IncidentFilter;
use crate::features::incidents::services::{IncidentChanges, IncidentService, IncidentSubmission};
use crate::shared::constants::MAX_IMAGE_SIZE;
use crate::shared::types::{ApiResponse, Meta, PaginationQuery};

/// Report an incident
///
/// Accepts multipart/form-data with `latitude`, `longitude`, `description`,
/// optional `incident_type`, `occurred_at` and an optional `image` file.
/// When no type is given the classifier's label is used.
#[utoipa::path(
    post,
    path = "/api/incidents",
    request_body(
        content = CreateIncidentDto,
        content_type = "multipart/form-data",
    ),
    responses(
        (status = 201, description = "Incident reported", body = ApiResponse<IncidentResponseDto>),
        (status = 400, description = "Invalid form data or image"),
        (status = 401, description = "Unauthorized"),
        (status = 413, description = "Image too large")
    ),
    security(("bearer_auth" = [])),
    tag = "incidents"
)]
pub async fn create_incident(
    RequireReporter(user): RequireReporter,
    State(service): State<Arc<IncidentService>>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<ApiResponse<IncidentResponseDto>>)> {
    let mut form = MultipartForm::read(multipart, MAX_IMAGE_SIZE).await?;

    let latitude = form
        .parse::<f64>("latitude")?
        .ok_or_else(|| AppError::Validation("latitude is required".to_string()))?;
    let longitude = form
        .parse::<f64>("longitude")?
        .ok_or_else(|| AppError::Validation("longitude is required".to_string()))?;
    let occurred_at = form
        .text("occurred_at")
        .map(|raw| {
            DateTime::parse_from_rfc3339(raw)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|_| {
                    AppError::Validation("occurred_at must be an RFC 3339 timestamp".to_string())
                })
        })
        .transpose()?;

    let submission = IncidentSubmission {
        latitude,
        longitude,
        incident_type: form.text("incident_type").map(str::to_string),
        description: form.required_text("description")?.to_string(),
        occurred_at,
        image: form.take_file("image"),
    };

    let incident = service.report(&user, submission).await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(
            Some(incident.into()),
            Some("Incident reported".to_string()),
            None,
        )),
    ))
}

/// List incidents
#[utoipa::path(
    get,
    path = "/api/incidents",
    params(PaginationQuery, ListIncidentsQuery),
    responses(
        (status = 200, description = "List of incidents", body = ApiResponse<Vec<IncidentResponseDto>>),
    ),
    tag = "incidents"
)]
pub async fn list_incidents(
    State(service): State<Arc<IncidentService>>,
    Query(pagination): Query<PaginationQuery>,
    Query(query): Query<ListIncidentsQuery>,
) -> Result<Json<ApiResponse<Vec<IncidentResponseDto>>>> {
    let filter = IncidentFilter {
        incident_type: query.incident_type.map(|t| t.trim().to_lowercase()),
        status: query.status,
        category: query.category,
        reporter_id: query.reporter_id,
    };

    let (incidents, total) = service.list(&filter, &pagination).await?;
    let dtos: Vec<IncidentResponseDto> = incidents.into_iter().map(|i| i.into()).collect();

    Ok(Json(ApiResponse::success(
        Some(dtos),
        None,
        Some(Meta::paged(total, &pagination)),
    )))
}

/// List the caller's own incidents
#[utoipa::path(
    get,
    path = "/api/incidents/mine",
    params(PaginationQuery),
    responses(
        (status = 200, description = "Incidents reported by the caller", body = ApiResponse<Vec<IncidentResponseDto>>),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "incidents"
)]
pub async fn list_my_incidents(
    user: AuthenticatedUser,
    State(service): State<Arc<IncidentService>>,
    Query(pagination): Query<PaginationQuery>,
) -> Result<Json<ApiResponse<Vec<IncidentResponseDto>>>> {
    let filter = IncidentFilter {
        reporter_id: Some(user.user_id),
        ..Default::default()
    };

    let (incidents, total) = service.list(&filter, &pagination).await?;
    let dtos: Vec<IncidentResponseDto> = incidents.into_iter().map(|i| i.into()).collect();

    Ok(Json(ApiResponse::success(
        Some(dtos),
        None,
        Some(Meta::paged(total, &pagination)),
    )))
}

/// Get incident by ID
#[utoipa::path(
    get,
    path = "/api/incidents/{id}",
    params(
        ("id" = Uuid, Path, description = "Incident ID")
    ),
    responses(
        (status = 200, description = "Incident found", body = ApiResponse<IncidentResponseDto>),
        (status = 404, description = "Incident not found")
    ),
    tag = "incidents"
)]
pub async fn get_incident(
    State(service): State<Arc<IncidentService>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<IncidentResponseDto>>> {
    let incident = service.get_by_id(id).await?;
    Ok(Json(ApiResponse::success(Some(incident.into()), None, None)))
}

/// Edit an incident
///
/// Reporters can edit their own incident while it is `reported`.
/// Admins can edit any incident and change its status.
#[utoipa::path(
    patch,
    path = "/api/incidents/{id}",
    params(
        ("id" = Uuid, Path, description = "Incident ID")
    ),
    request_body = UpdateIncidentDto,
    responses(
        (status = 200, description = "Incident updated", body = ApiResponse<IncidentResponseDto>),
        (status = 400, description = "Validation error"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not allowed to edit this incident"),
        (status = 404, description = "Incident not found"),
        (status = 409, description = "Incident can no longer be edited")
    ),
    security(("bearer_auth" = [])),
    tag = "incidents"
)]
pub async fn update_incident(
    user: AuthenticatedUser,
    State(service): State<Arc<IncidentService>>,
    Path(id): Path<Uuid>,
    AppJson(dto): AppJson<UpdateIncidentDto>,
) -> Result<Json<ApiResponse<IncidentResponseDto>>> {
    dto.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;
    if dto.is_empty() {
        return Err(AppError::Validation("No changes provided".to_string()));
    }

    let changes = IncidentChanges {
        incident_type: dto.incident_type,
        description: dto.description,
        latitude: dto.latitude,
        longitude: dto.longitude,
        status: dto.status,
        occurred_at: dto.occurred_at,
    };

    let incident = service.update(&user, id, changes).await?;
    Ok(Json(ApiResponse::success(
        Some(incident.into()),
        Some("Incident updated".to_string()),
        None,
    )))
}

/// Delete an incident (reporter or admin)
#[utoipa::path(
    delete,
    path = "/api/incidents/{id}",
    params(
        ("id" = Uuid, Path, description = "Incident ID")
    ),
    responses(
        (status = 200, description = "Incident deleted"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not allowed to delete this incident"),
        (status = 404, description = "Incident not found")
    ),
    security(("bearer_auth" = [])),
    tag = "incidents"
)]
pub async fn delete_incident(
    user: AuthenticatedUser,
    State(service): State<Arc<IncidentService>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>> {
    service.delete(&user, id).await?;
    Ok(Json(ApiResponse::success(
        None,
        Some("Incident deleted".to_string()),
        None,
    )))
}

/// Heatmap points as `[lat, lng, intensity]`
#[utoipa::path(
    get,
    path = "/api/incidents/heatmap",
    responses(
        (status = 200, description = "Heatmap points", body = ApiResponse<Vec<Vec<f64>>>),
    ),
    tag = "incidents"
)]
pub async fn get_heatmap(
    State(service): State<Arc<IncidentService>>,
) -> Result<Json<ApiResponse<Vec<[f64; 3]>>>> {
    let points = service.heatmap().await?;
    let total = points.len() as i64;
    Ok(Json(ApiResponse::success(
        Some(points),
        None,
        Some(Meta::total(total)),
    )))
}

/// Map markers for visible incidents
#[utoipa::path(
    get,
    path = "/api/incidents/markers",
    params(MarkersQuery),
    responses(
        (status = 200, description = "Map markers", body = ApiResponse<Vec<MapMarkerDto>>),
    ),
    tag = "incidents"
)]
pub async fn get_markers(
    State(service): State<Arc<IncidentService>>,
    Query(query): Query<MarkersQuery>,
) -> Result<Json<ApiResponse<Vec<MapMarkerDto>>>> {
    let incident_type = query.incident_type.map(|t| t.trim().to_lowercase());
    let markers: Vec<MapMarkerDto> = service
        .markers(incident_type.as_deref())
        .await?
        .into_iter()
        .map(MapMarkerDto::from)
        .collect();

    let total = markers.len() as i64;
    Ok(Json(ApiResponse::success(
        Some(markers),
        None,
        Some(Meta::total(total)),
    )))
}
