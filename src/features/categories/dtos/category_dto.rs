use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::features::categories::models::{Category, CategorySeverity};
use crate::shared::validation::{is_valid_slug, COLOR_REGEX};

/// Response DTO for category
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CategoryResponseDto {
    pub id: Uuid,
    pub name: String,
    /// Classifier label and dataset folder name
    pub slug: String,
    pub description: Option<String>,
    pub severity: CategorySeverity,
    pub color: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<Category> for CategoryResponseDto {
    fn from(c: Category) -> Self {
        Self {
            id: c.id,
            name: c.name,
            slug: c.slug,
            description: c.description,
            severity: c.severity,
            color: c.color,
            is_active: c.is_active,
            created_at: c.created_at,
        }
    }
}

/// Query params for listing categories
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ListCategoriesQuery {
    /// Include soft-deleted categories. Default: false
    #[serde(default)]
    pub include_inactive: bool,
}

fn validate_slug(slug: &str) -> Result<(), ValidationError> {
    if is_valid_slug(slug) {
        Ok(())
    } else {
        Err(ValidationError::new("slug")
            .with_message("Slug must be lowercase letters, digits and single hyphens".into()))
    }
}

/// Request DTO for creating a category
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateCategoryDto {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,

    /// Derived from the name when omitted
    #[validate(custom(function = "validate_slug"))]
    pub slug: Option<String>,

    #[validate(length(max = 1000, message = "Description must be at most 1000 characters"))]
    pub description: Option<String>,

    #[serde(default)]
    pub severity: CategorySeverity,

    #[validate(regex(path = *COLOR_REGEX, message = "Color must be a hex color like #ff0000"))]
    pub color: Option<String>,
}

/// Request DTO for updating a category. The slug is fixed once created.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateCategoryDto {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: Option<String>,

    #[validate(length(max = 1000, message = "Description must be at most 1000 characters"))]
    pub description: Option<String>,

    pub severity: Option<CategorySeverity>,

    #[validate(regex(path = *COLOR_REGEX, message = "Color must be a hex color like #ff0000"))]
    pub color: Option<String>,

    /// Set to true to restore a deleted category
    pub is_active: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create(name: &str, slug: Option<&str>, color: Option<&str>) -> CreateCategoryDto {
        CreateCategoryDto {
            name: name.to_string(),
            slug: slug.map(str::to_string),
            description: None,
            severity: CategorySeverity::default(),
            color: color.map(str::to_string),
        }
    }

    #[test]
    fn test_create_validation() {
        assert!(create("Theft", None, None).validate().is_ok());
        assert!(create("Theft", Some("theft"), Some("#ff0000")).validate().is_ok());

        assert!(create("", None, None).validate().is_err());
        assert!(create("Theft", Some("../etc"), None).validate().is_err());
        assert!(create("Theft", Some("Theft"), None).validate().is_err());
        assert!(create("Theft", None, Some("red")).validate().is_err());
    }

    #[test]
    fn test_severity_defaults_to_medium() {
        let dto: CreateCategoryDto = serde_json::from_str(r#"{"name": "Vandalism"}"#).unwrap();
        assert_eq!(dto.severity, CategorySeverity::Medium);
        assert!(dto.slug.is_none());
    }
}
