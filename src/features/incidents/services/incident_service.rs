use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::core::error::{AppError, Result};
use crate::core::extractor::UploadedFile;
use crate::features::auth::model::AuthenticatedUser;
use crate::features::categories::CategoryService;
use crate::features::classifier::preprocess::detected_extension;
use crate::features::classifier::ClassifierService;
use crate::features::incidents::models::{
    CreateIncident, Incident, IncidentFilter, IncidentStatus, MapMarker, UpdateIncident,
};
use crate::features::notifications::models::CreateNotification;
use crate::features::notifications::NotificationService;
use crate::modules::storage::{generate_key, ObjectStorage};
use crate::shared::constants::{MAX_IMAGE_SIZE, UNCLASSIFIED_INCIDENT_TYPE};
use crate::shared::types::PaginationQuery;
use crate::shared::validation::{is_valid_latitude, is_valid_longitude, slugify};

const INCIDENT_COLUMNS: &str = "id, reporter_id, category_id, incident_type, description, latitude, longitude, image_url, image_key, detected_type, detection_confidence, status, occurred_at, created_at, updated_at, deleted_at";

const MAX_DESCRIPTION_LENGTH: usize = 2000;
const MAX_TYPE_LENGTH: usize = 100;

/// A new incident as submitted by a reporter
#[derive(Debug)]
pub struct IncidentSubmission {
    pub latitude: f64,
    pub longitude: f64,
    pub incident_type: Option<String>,
    pub description: String,
    pub occurred_at: Option<DateTime<Utc>>,
    pub image: Option<UploadedFile>,
}

/// Requested changes to an incident
#[derive(Debug, Default)]
pub struct IncidentChanges {
    pub incident_type: Option<String>,
    pub description: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub status: Option<IncidentStatus>,
    pub occurred_at: Option<DateTime<Utc>>,
}

/// Service for incident reports
pub struct IncidentService {
    pool: PgPool,
    storage: Arc<dyn ObjectStorage>,
    classifier: Arc<ClassifierService>,
    categories: Arc<CategoryService>,
    notifications: Arc<NotificationService>,
}

impl IncidentService {
    pub fn new(
        pool: PgPool,
        storage: Arc<dyn ObjectStorage>,
        classifier: Arc<ClassifierService>,
        categories: Arc<CategoryService>,
        notifications: Arc<NotificationService>,
    ) -> Self {
        Self {
            pool,
            storage,
            classifier,
            categories,
            notifications,
        }
    }

    /// Record a new incident.
    ///
    /// An attached image is classified and stored. The incident type falls back
    /// to the classifier's label, then to "unclassified". Admins are notified.
    pub async fn report(
        &self,
        reporter: &AuthenticatedUser,
        submission: IncidentSubmission,
    ) -> Result<Incident> {
        validate_coordinates(submission.latitude, submission.longitude)?;
        let description = normalize_description(&submission.description)?;
        let requested_type = submission
            .incident_type
            .as_deref()
            .map(normalize_type)
            .transpose()?;

        let mut detection = None;
        let mut stored_image = None;
        if let Some(image) = submission.image {
            if image.data.len() > MAX_IMAGE_SIZE {
                return Err(AppError::PayloadTooLarge("Image is too large".to_string()));
            }
            let extension = detected_extension(&image.data).ok_or_else(|| {
                AppError::BadRequest("Image must be a JPEG, PNG or WebP file".to_string())
            })?;

            detection = self.classifier.detect(image.data.clone()).await?;

            let key = generate_key("incidents", extension);
            let url = self
                .storage
                .put(&key, &image.data, &image.content_type)
                .await?;
            stored_image = Some((key, url));
        }

        let incident_type = requested_type
            .or_else(|| detection.as_ref().map(|p| p.label.clone()))
            .unwrap_or_else(|| UNCLASSIFIED_INCIDENT_TYPE.to_string());
        let category_id = self.resolve_category(&incident_type).await?;

        let data = CreateIncident {
            reporter_id: reporter.user_id,
            category_id,
            incident_type,
            description,
            latitude: submission.latitude,
            longitude: submission.longitude,
            image_url: stored_image.as_ref().map(|(_, url)| url.clone()),
            image_key: stored_image.as_ref().map(|(key, _)| key.clone()),
            detected_type: detection.as_ref().map(|p| p.label.clone()),
            detection_confidence: detection.as_ref().map(|p| p.confidence),
            occurred_at: submission.occurred_at.unwrap_or_else(Utc::now),
        };

        let incident = match self.insert(&data).await {
            Ok(incident) => incident,
            Err(e) => {
                if let Some((key, _)) = stored_image {
                    if let Err(cleanup) = self.storage.delete(&key).await {
                        tracing::warn!("Failed to remove orphaned image {}: {:?}", key, cleanup);
                    }
                }
                return Err(e);
            }
        };

        tracing::info!(
            "Incident {} reported by {} (type={}, detected={:?})",
            incident.id,
            reporter.username,
            incident.incident_type,
            incident.detected_type
        );

        let notification = CreateNotification {
            incident_id: Some(incident.id),
            title: format!("New {} report", incident.incident_type),
            body: format!(
                "{} reported an incident at ({:.5}, {:.5})",
                reporter.username, incident.latitude, incident.longitude
            ),
        };
        if let Err(e) = self.notifications.notify_admins(&notification).await {
            tracing::warn!("Failed to notify admins of incident {}: {:?}", incident.id, e);
        }

        Ok(incident)
    }

    async fn insert(&self, data: &CreateIncident) -> Result<Incident> {
        sqlx::query_as::<_, Incident>(&format!(
            r#"
            INSERT INTO incidents (
                reporter_id, category_id, incident_type, description, latitude, longitude,
                image_url, image_key, detected_type, detection_confidence, occurred_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING {INCIDENT_COLUMNS}
            "#
        ))
        .bind(data.reporter_id)
        .bind(data.category_id)
        .bind(&data.incident_type)
        .bind(&data.description)
        .bind(data.latitude)
        .bind(data.longitude)
        .bind(&data.image_url)
        .bind(&data.image_key)
        .bind(&data.detected_type)
        .bind(data.detection_confidence)
        .bind(data.occurred_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to create incident: {:?}", e);
            AppError::Database(e)
        })
    }

    /// Active category whose slug matches the incident type
    async fn resolve_category(&self, incident_type: &str) -> Result<Option<Uuid>> {
        let slug = slugify(incident_type);
        if slug.is_empty() {
            return Ok(None);
        }
        Ok(self
            .categories
            .find_active_by_slug(&slug)
            .await?
            .map(|c| c.id))
    }

    /// Non-deleted incidents matching `filter`, newest first
    pub async fn list(
        &self,
        filter: &IncidentFilter,
        pagination: &PaginationQuery,
    ) -> Result<(Vec<Incident>, i64)> {
        const FILTER: &str = r#"
            deleted_at IS NULL
            AND ($1::text IS NULL OR incident_type = $1)
            AND ($2::incident_status IS NULL OR status = $2)
            AND ($3::text IS NULL OR category_id IN (SELECT id FROM categories WHERE slug = $3))
            AND ($4::uuid IS NULL OR reporter_id = $4)
        "#;

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM incidents WHERE {FILTER}"))
            .bind(&filter.incident_type)
            .bind(filter.status)
            .bind(&filter.category)
            .bind(filter.reporter_id)
            .fetch_one(&self.pool)
            .await
            .map_err(AppError::Database)?;

        let incidents = sqlx::query_as::<_, Incident>(&format!(
            r#"
            SELECT {INCIDENT_COLUMNS}
            FROM incidents
            WHERE {FILTER}
            ORDER BY created_at DESC
            LIMIT $5 OFFSET $6
            "#
        ))
        .bind(&filter.incident_type)
        .bind(filter.status)
        .bind(&filter.category)
        .bind(filter.reporter_id)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to list incidents: {:?}", e);
            AppError::Database(e)
        })?;

        Ok((incidents, total))
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<Incident> {
        sqlx::query_as::<_, Incident>(&format!(
            "SELECT {INCIDENT_COLUMNS} FROM incidents WHERE id = $1 AND deleted_at IS NULL"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::Database)?
        .ok_or_else(|| AppError::NotFound(format!("Incident {} not found", id)))
    }

    /// Edit an incident.
    ///
    /// Owners may edit while the incident is still `reported`; admins may edit
    /// anything, including status. A status change notifies the reporter.
    pub async fn update(
        &self,
        actor: &AuthenticatedUser,
        id: Uuid,
        changes: IncidentChanges,
    ) -> Result<Incident> {
        let current = self.get_by_id(id).await?;
        authorize_update(actor, &current, &changes)?;

        if changes.latitude.is_some() || changes.longitude.is_some() {
            validate_coordinates(
                changes.latitude.unwrap_or(current.latitude),
                changes.longitude.unwrap_or(current.longitude),
            )?;
        }

        let mut update = UpdateIncident {
            description: changes
                .description
                .as_deref()
                .map(normalize_description)
                .transpose()?,
            latitude: changes.latitude,
            longitude: changes.longitude,
            status: changes.status,
            occurred_at: changes.occurred_at,
            ..Default::default()
        };
        if let Some(raw_type) = changes.incident_type.as_deref() {
            let incident_type = normalize_type(raw_type)?;
            update.category_id = Some(self.resolve_category(&incident_type).await?);
            update.incident_type = Some(incident_type);
        }

        let updated = self
            .apply_update(id, &update, !actor.is_admin())
            .await?;

        if let Some(status) = changes.status.filter(|s| *s != current.status) {
            tracing::info!(
                "Incident {} status {} -> {} by {}",
                id,
                current.status,
                status,
                actor.username
            );
            if updated.reporter_id != actor.user_id {
                let notification = CreateNotification {
                    incident_id: Some(id),
                    title: format!("Your report is now {}", status),
                    body: format!(
                        "Your {} report was marked {} by an administrator.",
                        updated.incident_type, status
                    ),
                };
                if let Err(e) = self
                    .notifications
                    .notify(updated.reporter_id, &notification)
                    .await
                {
                    tracing::warn!("Failed to notify reporter of incident {}: {:?}", id, e);
                }
            }
        }

        Ok(updated)
    }

    /// Write `data`. With `only_if_reported` the row must still be `reported`
    /// at write time, otherwise the edit is a conflict.
    async fn apply_update(
        &self,
        id: Uuid,
        data: &UpdateIncident,
        only_if_reported: bool,
    ) -> Result<Incident> {
        let updated = sqlx::query_as::<_, Incident>(&format!(
            r#"
            UPDATE incidents
            SET incident_type = COALESCE($2, incident_type),
                category_id = CASE WHEN $3 THEN $4 ELSE category_id END,
                description = COALESCE($5, description),
                latitude = COALESCE($6, latitude),
                longitude = COALESCE($7, longitude),
                status = COALESCE($8, status),
                occurred_at = COALESCE($9, occurred_at),
                updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
              AND (NOT $10 OR status = $11)
            RETURNING {INCIDENT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&data.incident_type)
        .bind(data.category_id.is_some())
        .bind(data.category_id.flatten())
        .bind(&data.description)
        .bind(data.latitude)
        .bind(data.longitude)
        .bind(data.status)
        .bind(data.occurred_at)
        .bind(only_if_reported)
        .bind(IncidentStatus::Reported)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to update incident: {:?}", e);
            AppError::Database(e)
        })?;

        match updated {
            Some(incident) => Ok(incident),
            None if only_if_reported => Err(AppError::Conflict(format!(
                "Incident {} was changed and can no longer be edited",
                id
            ))),
            None => Err(AppError::NotFound(format!("Incident {} not found", id))),
        }
    }

    /// Soft delete; allowed for the reporter and admins
    pub async fn delete(&self, actor: &AuthenticatedUser, id: Uuid) -> Result<()> {
        let incident = self.get_by_id(id).await?;
        if !actor.can_modify(incident.reporter_id) {
            return Err(AppError::Forbidden(
                "Only the reporter or an admin can delete this incident".to_string(),
            ));
        }

        sqlx::query(
            "UPDATE incidents SET deleted_at = NOW(), updated_at = NOW() WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(AppError::Database)?;

        tracing::info!("Incident {} deleted by {}", id, actor.username);
        Ok(())
    }

    /// `[lat, lng, intensity]` for every visible incident
    pub async fn heatmap(&self) -> Result<Vec<[f64; 3]>> {
        let rows: Vec<(f64, f64)> = sqlx::query_as(
            "SELECT latitude, longitude FROM incidents WHERE deleted_at IS NULL AND status <> $1",
        )
        .bind(IncidentStatus::Dismissed)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::Database)?;

        Ok(heat_points(rows))
    }

    /// Map markers for visible incidents, optionally filtered by type
    pub async fn markers(&self, incident_type: Option<&str>) -> Result<Vec<MapMarker>> {
        sqlx::query_as::<_, MapMarker>(
            r#"
            SELECT i.id, i.latitude, i.longitude, i.incident_type, i.description, i.status,
                   i.image_url, i.occurred_at, c.color
            FROM incidents i
            LEFT JOIN categories c ON c.id = i.category_id
            WHERE i.deleted_at IS NULL
              AND i.status <> $1
              AND ($2::text IS NULL OR i.incident_type = $2)
            ORDER BY i.occurred_at DESC
            "#,
        )
        .bind(IncidentStatus::Dismissed)
        .bind(incident_type)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to load map markers: {:?}", e);
            AppError::Database(e)
        })
    }
}

fn heat_points(rows: Vec<(f64, f64)>) -> Vec<[f64; 3]> {
    rows.into_iter().map(|(lat, lng)| [lat, lng, 1.0]).collect()
}

fn validate_coordinates(latitude: f64, longitude: f64) -> Result<()> {
    if !is_valid_latitude(latitude) {
        return Err(AppError::Validation(
            "Latitude must be between -90 and 90".to_string(),
        ));
    }
    if !is_valid_longitude(longitude) {
        return Err(AppError::Validation(
            "Longitude must be between -180 and 180".to_string(),
        ));
    }
    Ok(())
}

fn normalize_description(raw: &str) -> Result<String> {
    let description = raw.trim();
    if description.is_empty() {
        return Err(AppError::Validation("Description is required".to_string()));
    }
    if description.chars().count() > MAX_DESCRIPTION_LENGTH {
        return Err(AppError::Validation(format!(
            "Description must be at most {} characters",
            MAX_DESCRIPTION_LENGTH
        )));
    }
    Ok(description.to_string())
}

/// Incident types are stored trimmed and lowercase
fn normalize_type(raw: &str) -> Result<String> {
    let incident_type = raw.trim().to_lowercase();
    if incident_type.is_empty() || incident_type.chars().count() > MAX_TYPE_LENGTH {
        return Err(AppError::Validation(format!(
            "Incident type must be 1-{} characters",
            MAX_TYPE_LENGTH
        )));
    }
    Ok(incident_type)
}

fn authorize_update(
    actor: &AuthenticatedUser,
    incident: &Incident,
    changes: &IncidentChanges,
) -> Result<()> {
    if actor.is_admin() {
        return Ok(());
    }
    if actor.user_id != incident.reporter_id {
        return Err(AppError::Forbidden(
            "Only the reporter or an admin can edit this incident".to_string(),
        ));
    }
    if changes.status.is_some() {
        return Err(AppError::Forbidden(
            "Only admins can change an incident's status".to_string(),
        ));
    }
    if incident.status != IncidentStatus::Reported {
        return Err(AppError::Conflict(format!(
            "Incident can no longer be edited (status: {})",
            incident.status
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::app::AppState;
    use crate::features::users::models::UserRole;
    use crate::shared::test_helpers::{seed_user, test_config};

    fn user(role: UserRole) -> AuthenticatedUser {
        AuthenticatedUser {
            user_id: Uuid::new_v4(),
            username: "juan".to_string(),
            role,
        }
    }

    fn incident(reporter_id: Uuid, status: IncidentStatus) -> Incident {
        let now = Utc::now();
        Incident {
            id: Uuid::new_v4(),
            reporter_id,
            category_id: None,
            incident_type: "theft".to_string(),
            description: "Bag snatched near the plaza".to_string(),
            latitude: 14.5995,
            longitude: 120.9842,
            image_url: None,
            image_key: None,
            detected_type: None,
            detection_confidence: None,
            status,
            occurred_at: now,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    #[test]
    fn test_heat_points_have_unit_intensity() {
        let points = heat_points(vec![(14.6, 120.98), (14.55, 121.0)]);
        assert_eq!(points, vec![[14.6, 120.98, 1.0], [14.55, 121.0, 1.0]]);
    }

    #[test]
    fn test_validate_coordinates() {
        assert!(validate_coordinates(14.5995, 120.9842).is_ok());
        assert!(validate_coordinates(-90.0, 180.0).is_ok());
        assert!(validate_coordinates(90.5, 0.0).is_err());
        assert!(validate_coordinates(0.0, -181.0).is_err());
        assert!(validate_coordinates(f64::NAN, 0.0).is_err());
    }

    #[test]
    fn test_normalize_inputs() {
        assert_eq!(normalize_type("  Theft ").unwrap(), "theft");
        assert!(normalize_type("   ").is_err());
        assert!(normalize_type(&"x".repeat(101)).is_err());

        assert_eq!(normalize_description(" broken window ").unwrap(), "broken window");
        assert!(normalize_description("").is_err());
    }

    #[test]
    fn test_owner_can_edit_while_reported() {
        let owner = user(UserRole::Reporter);
        let changes = IncidentChanges {
            description: Some("updated".to_string()),
            ..Default::default()
        };

        assert!(authorize_update(&owner, &incident(owner.user_id, IncidentStatus::Reported), &changes).is_ok());
        assert!(matches!(
            authorize_update(&owner, &incident(owner.user_id, IncidentStatus::Verified), &changes),
            Err(AppError::Conflict(_))
        ));
    }

    #[test]
    fn test_only_admins_change_status() {
        let owner = user(UserRole::Reporter);
        let changes = IncidentChanges {
            status: Some(IncidentStatus::Resolved),
            ..Default::default()
        };
        let record = incident(owner.user_id, IncidentStatus::Reported);

        assert!(matches!(
            authorize_update(&owner, &record, &changes),
            Err(AppError::Forbidden(_))
        ));
        assert!(authorize_update(&user(UserRole::Admin), &record, &changes).is_ok());
    }

    #[test]
    fn test_other_reporters_cannot_edit() {
        let record = incident(Uuid::new_v4(), IncidentStatus::Reported);
        assert!(matches!(
            authorize_update(&user(UserRole::Reporter), &record, &IncidentChanges::default()),
            Err(AppError::Forbidden(_))
        ));
    }

    fn submission(latitude: f64, longitude: f64) -> IncidentSubmission {
        IncidentSubmission {
            latitude,
            longitude,
            incident_type: Some("Flooding".to_string()),
            description: "Knee-deep water on the main road".to_string(),
            occurred_at: None,
            image: None,
        }
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_reported_incident_is_listed(pool: PgPool) {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::build(pool, &test_config(dir.path())).await.unwrap();
        let reporter = seed_user(&state.users, "maria", UserRole::Reporter).await;

        let created = state
            .incidents
            .report(&reporter, submission(14.6042, 120.9822))
            .await
            .unwrap();
        assert_eq!(created.incident_type, "flooding");
        assert_eq!(created.status, IncidentStatus::Reported);

        let (listed, total) = state
            .incidents
            .list(&IncidentFilter::default(), &PaginationQuery::default())
            .await
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(listed[0].id, created.id);
        assert_eq!(listed[0].latitude, 14.6042);
        assert_eq!(listed[0].longitude, 120.9822);

        let heat = state.incidents.heatmap().await.unwrap();
        assert_eq!(heat, vec![[14.6042, 120.9822, 1.0]]);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_owner_edit_loses_to_status_change(pool: PgPool) {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::build(pool, &test_config(dir.path())).await.unwrap();
        let reporter = seed_user(&state.users, "maria", UserRole::Reporter).await;
        let admin = seed_user(&state.users, "kapitan", UserRole::Admin).await;

        let incident = state
            .incidents
            .report(&reporter, submission(14.6, 120.98))
            .await
            .unwrap();

        // The owner's permission check saw `reported`; the admin verifies first
        state
            .incidents
            .update(
                &admin,
                incident.id,
                IncidentChanges {
                    status: Some(IncidentStatus::Verified),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let stale_edit = UpdateIncident {
            description: Some("Water is now waist-deep".to_string()),
            ..Default::default()
        };
        let result = state
            .incidents
            .apply_update(incident.id, &stale_edit, true)
            .await;
        assert!(matches!(result, Err(AppError::Conflict(_))));

        let current = state.incidents.get_by_id(incident.id).await.unwrap();
        assert_eq!(current.status, IncidentStatus::Verified);
        assert_eq!(current.description, incident.description);

        let (notifications, _) = state
            .notifications
            .list(reporter.user_id, false, &PaginationQuery::default())
            .await
            .unwrap();
        assert_eq!(notifications.len(), 1);
    }
}
