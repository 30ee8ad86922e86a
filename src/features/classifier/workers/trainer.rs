//! Blocking training job: load the dataset, fit a fresh network, persist it.

use ndarray::Array3;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::core::config::ClassifierConfig;
use crate::core::error::{AppError, Result};
use crate::features::classifier::network::{ConvNet, FitSummary};
use crate::features::classifier::preprocess::load_input;
use crate::features::dataset::services::LabelImages;

/// A finished training job
pub struct TrainedModel {
    pub model: ConvNet,
    pub summary: FitSummary,
    pub sample_count: usize,
}

/// Train on `labels` (label order defines class indices) and save the model.
///
/// Runs on a blocking thread. Unreadable images are skipped.
pub fn train_model(config: &ClassifierConfig, labels: &[LabelImages]) -> Result<TrainedModel> {
    let mut rng = StdRng::seed_from_u64(config.seed);
    let samples = load_samples(labels, config.image_size);

    let classes_with_samples = labels
        .iter()
        .enumerate()
        .filter(|(class, _)| samples.iter().any(|(_, c)| c == class))
        .count();
    if classes_with_samples < 2 {
        return Err(AppError::Unprocessable(
            "Training needs readable images for at least two labels".to_string(),
        ));
    }

    tracing::info!(
        "Training classifier on {} images across {} labels ({} epochs, lr {})",
        samples.len(),
        labels.len(),
        config.epochs,
        config.learning_rate
    );

    let names: Vec<String> = labels.iter().map(|l| l.label.clone()).collect();
    let mut model = ConvNet::new(names, config.image_size, config.filters, &mut rng);
    let summary = model.fit(&samples, config.epochs, config.learning_rate, &mut rng);

    model.save(&config.model_path)?;
    tracing::info!(
        "Classifier saved to {} (loss {:.4}, accuracy {:.2})",
        config.model_path.display(),
        summary.final_loss,
        summary.accuracy
    );

    Ok(TrainedModel {
        model,
        summary,
        sample_count: samples.len(),
    })
}

fn load_samples(labels: &[LabelImages], image_size: usize) -> Vec<(Array3<f32>, usize)> {
    let mut samples = Vec::new();
    for (class, label) in labels.iter().enumerate() {
        for path in &label.paths {
            let input = std::fs::read(path)
                .map_err(AppError::from)
                .and_then(|bytes| load_input(&bytes, image_size));
            match input {
                Ok(input) => samples.push((input, class)),
                Err(e) => tracing::warn!("Skipping training image {}: {}", path.display(), e),
            }
        }
    }
    samples
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::classifier::preprocess::tests::solid_png;
    use std::path::Path;

    fn config(dir: &Path) -> ClassifierConfig {
        ClassifierConfig {
            dataset_dir: dir.join("dataset"),
            model_path: dir.join("model/classifier.json"),
            image_size: 8,
            filters: 4,
            epochs: 10,
            learning_rate: 0.01,
            min_confidence: 0.5,
            seed: 42,
        }
    }

    fn label_with_images(dir: &Path, label: &str, color: [u8; 3], count: usize) -> LabelImages {
        let folder = dir.join("dataset").join(label);
        std::fs::create_dir_all(&folder).unwrap();
        let paths = (0..count)
            .map(|i| {
                let path = folder.join(format!("{}.png", i));
                std::fs::write(&path, solid_png(12, 12, color)).unwrap();
                path
            })
            .collect();
        LabelImages {
            label: label.to_string(),
            paths,
        }
    }

    #[test]
    fn test_train_model_saves_labels_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let labels = vec![
            label_with_images(dir.path(), "arson", [230, 30, 20], 4),
            label_with_images(dir.path(), "flooding", [20, 40, 220], 4),
        ];

        let trained = train_model(&config, &labels).unwrap();
        assert_eq!(trained.sample_count, 8);
        assert!(config.model_path.exists());

        let loaded = ConvNet::load(&config.model_path).unwrap();
        assert_eq!(loaded.labels(), ["arson".to_string(), "flooding".to_string()]);
    }

    #[test]
    fn test_unreadable_images_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let mut arson = label_with_images(dir.path(), "arson", [230, 30, 20], 2);
        let broken = dir.path().join("dataset/arson/broken.png");
        std::fs::write(&broken, b"not really a png").unwrap();
        arson.paths.push(broken);

        let labels = vec![arson, label_with_images(dir.path(), "flooding", [20, 40, 220], 2)];
        let trained = train_model(&config, &labels).unwrap();
        assert_eq!(trained.sample_count, 4);
    }

    #[test]
    fn test_requires_two_readable_labels() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let folder = dir.path().join("dataset/flooding");
        std::fs::create_dir_all(&folder).unwrap();
        std::fs::write(folder.join("x.png"), b"garbage").unwrap();

        let labels = vec![
            label_with_images(dir.path(), "arson", [230, 30, 20], 2),
            LabelImages {
                label: "flooding".to_string(),
                paths: vec![folder.join("x.png")],
            },
        ];
        assert!(matches!(
            train_model(&config, &labels),
            Err(AppError::Unprocessable(_))
        ));
        assert!(!config.model_path.exists());
    }
}
