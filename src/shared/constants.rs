/// Default page size for pagination
pub const DEFAULT_PAGE_SIZE: i64 = 20;

/// Maximum page size allowed
pub const MAX_PAGE_SIZE: i64 = 100;

// =============================================================================
// UPLOADS
// =============================================================================

/// Maximum size of a single uploaded image (10MB)
pub const MAX_IMAGE_SIZE: usize = 10 * 1024 * 1024;

/// Maximum size of an imported dataset archive (200MB)
pub const MAX_ARCHIVE_SIZE: usize = 200 * 1024 * 1024;

/// Incident type used when neither the reporter nor the classifier supplies one
pub const UNCLASSIFIED_INCIDENT_TYPE: &str = "unclassified";
