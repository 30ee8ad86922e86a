use std::collections::HashSet;
use std::io::{Cursor, Read, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use uuid::Uuid;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::core::error::{AppError, Result};
use crate::core::extractor::UploadedFile;
use crate::features::categories::CategoryService;
use crate::features::classifier::preprocess::{decode_image, detected_extension};
use crate::shared::constants::MAX_IMAGE_SIZE;
use crate::shared::validation::is_valid_slug;

/// Extensions recognised as training images
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp"];

const STAGING_PREFIX: &str = ".import-";

/// Image count for one label folder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelSummary {
    pub label: String,
    pub image_count: usize,
}

/// All image paths for one label, as consumed by training
#[derive(Debug, Clone)]
pub struct LabelImages {
    pub label: String,
    pub paths: Vec<PathBuf>,
}

#[derive(Debug, Clone, Default)]
pub struct AddImagesOutcome {
    /// Stored file names
    pub added: Vec<String>,
    /// Original names of uploads that were not images
    pub skipped: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportOutcome {
    pub imported: usize,
    pub skipped: usize,
}

/// Folder-per-label training image store
pub struct DatasetService {
    root: PathBuf,
    categories: Arc<CategoryService>,
}

impl DatasetService {
    pub fn new(root: PathBuf, categories: Arc<CategoryService>) -> Self {
        Self { root, categories }
    }

    /// Labels (sorted) with their image counts
    pub async fn summary(&self) -> Result<Vec<LabelSummary>> {
        let root = self.root.clone();
        let labels = blocking(move || scan_dir(&root)).await?;
        Ok(labels
            .into_iter()
            .map(|l| LabelSummary {
                label: l.label,
                image_count: l.paths.len(),
            })
            .collect())
    }

    /// Active-category labels with at least one image, sorted, with their image paths
    pub async fn scan(&self) -> Result<Vec<LabelImages>> {
        let active = self.active_labels().await?;
        let root = self.root.clone();
        let labels = blocking(move || scan_dir(&root)).await?;

        Ok(labels
            .into_iter()
            .filter(|l| !l.paths.is_empty())
            .filter(|l| {
                let known = active.contains(&l.label);
                if !known {
                    tracing::warn!("Leaving out dataset label '{}': no active category", l.label);
                }
                known
            })
            .collect())
    }

    async fn active_labels(&self) -> Result<HashSet<String>> {
        Ok(self
            .categories
            .list(false)
            .await?
            .into_iter()
            .map(|c| c.slug)
            .collect())
    }

    /// Store uploaded images under `label`. The label must be an active category slug.
    pub async fn add_images(&self, label: &str, files: Vec<UploadedFile>) -> Result<AddImagesOutcome> {
        validate_label(label)?;
        if self.categories.find_active_by_slug(label).await?.is_none() {
            return Err(AppError::BadRequest(format!(
                "'{}' is not an active category",
                label
            )));
        }
        if files.is_empty() {
            return Err(AppError::BadRequest("No image files provided".to_string()));
        }

        let dir = self.root.join(label);
        let outcome = blocking(move || {
            std::fs::create_dir_all(&dir)?;
            let mut outcome = AddImagesOutcome::default();

            for file in files {
                let extension = match detected_extension(&file.data) {
                    Some(ext) if decode_image(&file.data).is_ok() => ext,
                    _ => {
                        tracing::warn!("Skipping non-image upload '{}'", file.file_name);
                        outcome.skipped.push(file.file_name);
                        continue;
                    }
                };

                let name = format!("{}.{}", Uuid::new_v4(), extension);
                std::fs::write(dir.join(&name), &file.data)?;
                outcome.added.push(name);
            }
            Ok(outcome)
        })
        .await?;

        tracing::info!(
            "Dataset label '{}': added {} images, skipped {}",
            label,
            outcome.added.len(),
            outcome.skipped.len()
        );
        Ok(outcome)
    }

    /// Remove a label folder with all its images
    pub async fn delete_label(&self, label: &str) -> Result<()> {
        validate_label(label)?;
        let dir = self.root.join(label);

        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => {
                tracing::info!("Deleted dataset label '{}'", label);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(AppError::NotFound(
                format!("Dataset label '{}' not found", label),
            )),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn delete_image(&self, label: &str, file_name: &str) -> Result<()> {
        validate_label(label)?;
        if !is_safe_file_name(file_name) {
            return Err(AppError::BadRequest(format!(
                "Invalid image name '{}'",
                file_name
            )));
        }

        match tokio::fs::remove_file(self.root.join(label).join(file_name)).await {
            Ok(()) => {
                tracing::info!("Deleted dataset image {}/{}", label, file_name);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(AppError::NotFound(
                format!("Image '{}/{}' not found", label, file_name),
            )),
            Err(e) => Err(e.into()),
        }
    }

    /// Zip of the whole dataset with entries named `label/file`
    pub async fn export_zip(&self) -> Result<Vec<u8>> {
        let root = self.root.clone();
        blocking(move || {
            let labels = scan_dir(&root)?;
            let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
            let options =
                SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

            for entry in &labels {
                writer
                    .add_directory(format!("{}/", entry.label), options)
                    .map_err(zip_error)?;
                for path in &entry.paths {
                    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                        continue;
                    };
                    writer
                        .start_file(format!("{}/{}", entry.label, name), options)
                        .map_err(zip_error)?;
                    writer.write_all(&std::fs::read(path)?)?;
                }
            }

            let cursor = writer.finish().map_err(zip_error)?;
            Ok(cursor.into_inner())
        })
        .await
    }

    /// Extract `label/file.ext` entries from a zip archive.
    ///
    /// Entries with unsafe paths, unknown labels, unreadable or oversized data
    /// or non-image content are skipped. With `replace` the existing dataset is
    /// swapped for the archive contents once the archive has been read.
    pub async fn import_zip(&self, bytes: Vec<u8>, replace: bool) -> Result<ImportOutcome> {
        let known_labels = self.active_labels().await?;

        let root = self.root.clone();
        let outcome =
            blocking(move || extract_archive(&root, bytes, replace, &known_labels)).await?;

        tracing::info!(
            "Dataset import: {} imported, {} skipped (replace={})",
            outcome.imported,
            outcome.skipped,
            replace
        );
        Ok(outcome)
    }

    /// Delete every label folder
    pub async fn clear(&self) -> Result<()> {
        let root = self.root.clone();
        blocking(move || clear_dir(&root)).await
    }
}

/// Unpack an archive into `root`.
///
/// Entries are written to a hidden staging directory under `root` first and
/// moved into place only after every entry has been read, so a failing import
/// never leaves the dataset half cleared.
fn extract_archive(
    root: &Path,
    bytes: Vec<u8>,
    replace: bool,
    known_labels: &HashSet<String>,
) -> Result<ImportOutcome> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| AppError::BadRequest(format!("Invalid zip archive: {}", e)))?;

    std::fs::create_dir_all(root)?;
    let staging = tempfile::Builder::new()
        .prefix(STAGING_PREFIX)
        .tempdir_in(root)?;

    let mut outcome = ImportOutcome::default();
    for i in 0..archive.len() {
        let mut entry = match archive.by_index(i) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("Skipping unreadable archive entry #{}: {}", i, e);
                outcome.skipped += 1;
                continue;
            }
        };
        if entry.is_dir() {
            continue;
        }
        let name = entry.name().to_string();

        let Some((label, file_name)) = entry
            .enclosed_name()
            .and_then(|p| split_entry_path(&p))
            .filter(|(label, _)| known_labels.contains(label))
        else {
            tracing::warn!("Skipping archive entry '{}'", name);
            outcome.skipped += 1;
            continue;
        };

        if entry.size() > MAX_IMAGE_SIZE as u64 {
            tracing::warn!("Skipping oversized archive entry '{}'", name);
            outcome.skipped += 1;
            continue;
        }
        let mut data = Vec::new();
        if let Err(e) = entry
            .by_ref()
            .take(MAX_IMAGE_SIZE as u64 + 1)
            .read_to_end(&mut data)
        {
            tracing::warn!("Skipping corrupt archive entry '{}': {}", name, e);
            outcome.skipped += 1;
            continue;
        }
        if data.len() > MAX_IMAGE_SIZE {
            tracing::warn!("Skipping oversized archive entry '{}'", name);
            outcome.skipped += 1;
            continue;
        }
        if decode_image(&data).is_err() {
            tracing::warn!("Skipping non-image archive entry '{}'", name);
            outcome.skipped += 1;
            continue;
        }

        let dir = staging.path().join(&label);
        std::fs::create_dir_all(&dir)?;
        std::fs::write(dir.join(&file_name), &data)?;
        outcome.imported += 1;
    }

    if replace {
        clear_dir(root)?;
    }
    for label in std::fs::read_dir(staging.path())? {
        let label = label?;
        let target = root.join(label.file_name());
        std::fs::create_dir_all(&target)?;
        for file in std::fs::read_dir(label.path())? {
            let file = file?;
            std::fs::rename(file.path(), target.join(file.file_name()))?;
        }
    }

    Ok(outcome)
}

/// Labels are category slugs, which also rules out `..`, separators and empty names
pub fn validate_label(label: &str) -> Result<()> {
    if is_valid_slug(label) {
        Ok(())
    } else {
        Err(AppError::BadRequest(format!(
            "Invalid dataset label '{}'",
            label
        )))
    }
}

fn is_image_file(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
}

/// A bare file name with an image extension
fn is_safe_file_name(name: &str) -> bool {
    !name.starts_with('.')
        && !name.contains(['/', '\\'])
        && name.len() <= 255
        && is_image_file(name)
}

/// Split an archive path into `(label, file_name)`, requiring exactly two components
fn split_entry_path(path: &Path) -> Option<(String, String)> {
    let mut components = path.components();
    let (Some(Component::Normal(label)), Some(Component::Normal(file)), None) =
        (components.next(), components.next(), components.next())
    else {
        return None;
    };

    let label = label.to_str()?;
    let file = file.to_str()?;
    (is_valid_slug(label) && is_safe_file_name(file)).then(|| (label.to_string(), file.to_string()))
}

fn scan_dir(root: &Path) -> Result<Vec<LabelImages>> {
    let entries = match std::fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut labels = Vec::new();
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let Some(label) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        if !is_valid_slug(&label) {
            tracing::warn!("Ignoring dataset folder '{}'", label);
            continue;
        }

        let mut paths: Vec<PathBuf> = std::fs::read_dir(entry.path())?
            .filter_map(|f| f.ok())
            .filter(|f| f.file_type().is_ok_and(|t| t.is_file()))
            .filter(|f| f.file_name().to_str().is_some_and(is_safe_file_name))
            .map(|f| f.path())
            .collect();
        paths.sort();

        labels.push(LabelImages { label, paths });
    }

    labels.sort_by(|a, b| a.label.cmp(&b.label));
    Ok(labels)
}

/// Remove every label folder and stray file. Dot-prefixed entries, including
/// import staging directories, are left alone.
fn clear_dir(root: &Path) -> Result<()> {
    let entries = match std::fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into()),
    };

    for entry in entries {
        let entry = entry?;
        if entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }
        if entry.file_type()?.is_dir() {
            std::fs::remove_dir_all(entry.path())?;
        } else {
            std::fs::remove_file(entry.path())?;
        }
    }
    Ok(())
}

fn zip_error(e: zip::result::ZipError) -> AppError {
    AppError::Internal(format!("Zip archive error: {}", e))
}

async fn blocking<T, F>(f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AppError::Internal(format!("Dataset task failed: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::app::AppState;
    use crate::features::classifier::preprocess::tests::solid_png;
    use crate::shared::test_helpers::test_config;
    use sqlx::PgPool;

    fn write_image(root: &Path, label: &str, name: &str) {
        let dir = root.join(label);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(name), solid_png(4, 4, [10, 20, 30])).unwrap();
    }

    #[test]
    fn test_validate_label_rejects_traversal() {
        assert!(validate_label("theft").is_ok());
        assert!(validate_label("illegal-parking").is_ok());

        for bad in ["..", "../theft", "a/b", "Theft", "", "theft/..", "."] {
            assert!(validate_label(bad).is_err(), "{:?} should be rejected", bad);
        }
    }

    #[test]
    fn test_safe_file_names() {
        assert!(is_safe_file_name("photo.jpg"));
        assert!(is_safe_file_name("IMG_001.PNG"));
        assert!(!is_safe_file_name("../photo.jpg"));
        assert!(!is_safe_file_name(".hidden.png"));
        assert!(!is_safe_file_name("notes.txt"));
        assert!(!is_safe_file_name("a\\b.jpg"));
    }

    #[test]
    fn test_split_entry_path() {
        assert_eq!(
            split_entry_path(Path::new("theft/a.jpg")),
            Some(("theft".to_string(), "a.jpg".to_string()))
        );
        assert_eq!(split_entry_path(Path::new("a.jpg")), None);
        assert_eq!(split_entry_path(Path::new("theft/nested/a.jpg")), None);
        assert_eq!(split_entry_path(Path::new("Theft/a.jpg")), None);
        assert_eq!(split_entry_path(Path::new("theft/readme.txt")), None);
    }

    #[test]
    fn test_scan_dir_sorts_and_filters() {
        let dir = tempfile::tempdir().unwrap();
        write_image(dir.path(), "vandalism", "b.png");
        write_image(dir.path(), "vandalism", "a.png");
        write_image(dir.path(), "arson", "x.png");
        std::fs::create_dir_all(dir.path().join("empty")).unwrap();
        std::fs::create_dir_all(dir.path().join("Not_A_Slug")).unwrap();
        std::fs::write(dir.path().join("arson/notes.txt"), b"ignore me").unwrap();
        std::fs::write(dir.path().join("stray.png"), b"top-level file").unwrap();

        let labels = scan_dir(dir.path()).unwrap();
        let names: Vec<&str> = labels.iter().map(|l| l.label.as_str()).collect();
        assert_eq!(names, vec!["arson", "empty", "vandalism"]);
        assert_eq!(labels[0].paths.len(), 1);
        assert!(labels[1].paths.is_empty());
        assert!(labels[2].paths[0].ends_with("a.png"));
    }

    #[test]
    fn test_scan_missing_root_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(scan_dir(&dir.path().join("missing")).unwrap().is_empty());
    }

    #[test]
    fn test_clear_dir() {
        let dir = tempfile::tempdir().unwrap();
        write_image(dir.path(), "arson", "x.png");
        clear_dir(dir.path()).unwrap();
        assert!(dir.path().exists());
        assert!(scan_dir(dir.path()).unwrap().is_empty());
    }

    fn build_archive(entries: &[(&str, &[u8])], method: CompressionMethod) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(method);
        for (name, data) in entries {
            writer.start_file(*name, options).unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    fn labels(names: &[&str]) -> HashSet<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    fn image_names(root: &Path, label: &str) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(root.join(label))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_replace_import_skips_corrupt_entries() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["a.png", "b.png", "c.png"] {
            write_image(dir.path(), "arson", name);
        }

        let good = solid_png(4, 4, [10, 20, 30]);
        let bad = solid_png(4, 4, [200, 100, 50]);
        let mut bytes = build_archive(
            &[("arson/good.png", good.as_slice()), ("arson/bad.png", bad.as_slice())],
            CompressionMethod::Stored,
        );
        // Flip a byte of the stored data so the entry fails its checksum
        let offset = bytes
            .windows(bad.len())
            .position(|w| w == bad.as_slice())
            .unwrap();
        bytes[offset + bad.len() - 1] ^= 0xff;

        let outcome = extract_archive(dir.path(), bytes, true, &labels(&["arson"])).unwrap();
        assert_eq!(outcome, ImportOutcome { imported: 1, skipped: 1 });
        assert_eq!(image_names(dir.path(), "arson"), vec!["good.png"]);
    }

    #[test]
    fn test_failed_replace_keeps_existing_dataset() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["a.png", "b.png", "c.png"] {
            write_image(dir.path(), "arson", name);
        }

        let result = extract_archive(dir.path(), b"not a zip".to_vec(), true, &labels(&["arson"]));
        assert!(matches!(result, Err(AppError::BadRequest(_))));
        assert_eq!(image_names(dir.path(), "arson"), vec!["a.png", "b.png", "c.png"]);
    }

    #[test]
    fn test_import_merges_and_skips_unknown_labels() {
        let dir = tempfile::tempdir().unwrap();
        write_image(dir.path(), "arson", "a.png");

        let png = solid_png(4, 4, [1, 2, 3]);
        let bytes = build_archive(
            &[
                ("arson/new.png", png.as_slice()),
                ("flooding/x.png", png.as_slice()),
                ("arson/nested/escape.png", png.as_slice()),
                ("arson/readme.txt", b"text".as_slice()),
            ],
            CompressionMethod::Deflated,
        );

        let outcome = extract_archive(dir.path(), bytes, false, &labels(&["arson"])).unwrap();
        assert_eq!(outcome, ImportOutcome { imported: 1, skipped: 3 });
        assert_eq!(image_names(dir.path(), "arson"), vec!["a.png", "new.png"]);
        assert!(!dir.path().join("flooding").exists());

        // Staging directory is gone
        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with(STAGING_PREFIX))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_import_skips_oversized_entries() {
        let dir = tempfile::tempdir().unwrap();
        let huge = vec![0u8; MAX_IMAGE_SIZE + 1];
        let bytes = build_archive(&[("arson/huge.png", huge.as_slice())], CompressionMethod::Deflated);
        assert!(bytes.len() < MAX_IMAGE_SIZE / 100);

        let outcome = extract_archive(dir.path(), bytes, false, &labels(&["arson"])).unwrap();
        assert_eq!(outcome, ImportOutcome { imported: 0, skipped: 1 });
        assert!(!dir.path().join("arson").exists());
    }

    #[test]
    fn test_clear_dir_keeps_staging_directories() {
        let dir = tempfile::tempdir().unwrap();
        write_image(dir.path(), "arson", "x.png");
        let staging = dir.path().join(".import-abc");
        std::fs::create_dir_all(&staging).unwrap();

        clear_dir(dir.path()).unwrap();
        assert!(staging.exists());
        assert!(!dir.path().join("arson").exists());
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_scan_leaves_out_inactive_categories(pool: PgPool) {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let state = AppState::build(pool.clone(), &config).await.unwrap();

        sqlx::query(
            "INSERT INTO categories (name, slug, is_active) VALUES ('Arson', 'arson', TRUE), ('Flooding', 'flooding', FALSE)",
        )
        .execute(&pool)
        .await
        .unwrap();
        let root = &config.classifier.dataset_dir;
        write_image(root, "arson", "a.png");
        write_image(root, "flooding", "b.png");
        write_image(root, "vandalism", "c.png");

        let scanned = state.dataset.scan().await.unwrap();
        let names: Vec<&str> = scanned.iter().map(|l| l.label.as_str()).collect();
        assert_eq!(names, vec!["arson"]);

        // The summary still shows every folder on disk
        assert_eq!(state.dataset.summary().await.unwrap().len(), 3);
    }
}
