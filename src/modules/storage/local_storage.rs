//! Filesystem-backed object storage
//!
//! Objects are written under `upload_dir` and served by the router under
//! `url_prefix`, so an object key maps directly to a public URL.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::core::config::StorageConfig;
use crate::core::error::AppError;

/// Storage backend for uploaded files
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Store `data` under `key`, returning its public URL
    async fn put(&self, key: &str, data: &[u8], content_type: &str) -> Result<String, AppError>;

    /// Delete an object. Missing objects are not an error.
    async fn delete(&self, key: &str) -> Result<(), AppError>;

    /// Public URL for a key
    fn url_for(&self, key: &str) -> String;
}

/// Generate a collision-free key: `{folder}/{yyyy}/{mm}/{uuid}.{ext}`
pub fn generate_key(folder: &str, extension: &str) -> String {
    let now = Utc::now();
    format!(
        "{}/{}/{}.{}",
        folder,
        now.format("%Y/%m"),
        Uuid::now_v7(),
        extension
    )
}

/// Local disk storage rooted at a single directory
pub struct LocalStorage {
    root: PathBuf,
    url_prefix: String,
}

impl LocalStorage {
    /// Create the storage, making sure the root directory exists
    pub async fn new(config: &StorageConfig) -> Result<Self, AppError> {
        tokio::fs::create_dir_all(&config.upload_dir).await?;

        info!(
            "Local storage initialized at {} (served under {})",
            config.upload_dir.display(),
            config.url_prefix
        );

        Ok(Self {
            root: config.upload_dir.clone(),
            url_prefix: config.url_prefix.trim_end_matches('/').to_string(),
        })
    }

    /// Resolve a key to a path under the root, rejecting keys that could escape it
    fn path_for(&self, key: &str) -> Result<PathBuf, AppError> {
        let relative = Path::new(key);
        let is_safe = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));

        if !is_safe {
            return Err(AppError::BadRequest(format!("Invalid storage key '{}'", key)));
        }

        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ObjectStorage for LocalStorage {
    async fn put(&self, key: &str, data: &[u8], content_type: &str) -> Result<String, AppError> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Write to a sibling temp file first so readers never see a partial object
        let tmp = path.with_extension(format!("{}.tmp", Uuid::new_v4().simple()));
        tokio::fs::write(&tmp, data).await?;
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        debug!("Stored '{}' ({} bytes, {})", key, data.len(), content_type);
        Ok(self.url_for(key))
    }

    async fn delete(&self, key: &str) -> Result<(), AppError> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!("Deleted '{}'", key);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn url_for(&self, key: &str) -> String {
        format!("{}/{}", self.url_prefix, key)
    }
}
