use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use utoipa::ToSchema;
use uuid::Uuid;

/// Category severity enum matching database enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Type, ToSchema)]
#[sqlx(type_name = "category_severity", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CategorySeverity {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

/// Database model for category
///
/// `slug` doubles as the classifier class name and the dataset folder name.
#[derive(Debug, Clone, FromRow)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub severity: CategorySeverity,
    pub color: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Data for creating a category
#[derive(Debug)]
pub struct CreateCategory {
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub severity: CategorySeverity,
    pub color: Option<String>,
}

/// Data for updating a category. `None` leaves the column unchanged.
#[derive(Debug, Default)]
pub struct UpdateCategory {
    pub name: Option<String>,
    pub description: Option<String>,
    pub severity: Option<CategorySeverity>,
    pub color: Option<String>,
    pub is_active: Option<bool>,
}
