//! A small convolutional network for incident photo classification.
//!
//! Architecture: 3x3 "same" convolution -> ReLU -> 2x2 max-pool -> dense -> softmax.
//! Inputs are channel-first RGB tensors of shape `(3, S, S)` with `S` even.
//!
//! The ordered label list is part of the serialized model, so output index `i`
//! always maps to `labels[i]` regardless of how the dataset is laid out later.

use std::io::Write;
use std::path::Path;

use chrono::{DateTime, Utc};
use ndarray::{Array1, Array2, Array3, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::error::AppError;

const CHANNELS: usize = 3;
const KERNEL: usize = 3;
const PATCH: usize = CHANNELS * KERNEL * KERNEL;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("model file is malformed: {0}")]
    Format(#[from] serde_json::Error),

    #[error("model is inconsistent: {0}")]
    Shape(String),
}

impl From<ModelError> for AppError {
    fn from(e: ModelError) -> Self {
        AppError::Internal(e.to_string())
    }
}

/// Result of classifying one image
#[derive(Debug, Clone)]
pub struct Prediction {
    pub label: String,
    pub confidence: f32,
    /// `(label, probability)` in model label order
    pub probabilities: Vec<(String, f32)>,
}

/// Outcome of a training run
#[derive(Debug, Clone, Copy)]
pub struct FitSummary {
    /// Mean cross-entropy over the last epoch
    pub final_loss: f32,
    /// Training-set accuracy after the last epoch
    pub accuracy: f32,
}

/// Intermediate values of a forward pass needed for backpropagation
struct Activations {
    /// im2col patches, `(S*S, PATCH)`
    patches: Array2<f32>,
    /// Pre-activation conv output, `(S*S, F)`
    conv: Array2<f32>,
    /// Pooled features, flattened `f * P*P + pi * P + pj`
    pooled: Array1<f32>,
    /// Row of `conv` that won each pooling window, same indexing as `pooled`
    pool_argmax: Vec<usize>,
    probs: Array1<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvNet {
    labels: Vec<String>,
    image_size: usize,
    /// `(F, PATCH)`, patch column order is `c * 9 + dy * 3 + dx`
    conv_w: Array2<f32>,
    conv_b: Array1<f32>,
    /// `(K, F * P * P)`
    dense_w: Array2<f32>,
    dense_b: Array1<f32>,
    trained_at: DateTime<Utc>,
}

impl ConvNet {
    /// Randomly initialised network (He-uniform weights, zero biases)
    pub fn new(labels: Vec<String>, image_size: usize, filters: usize, rng: &mut StdRng) -> Self {
        let pooled = image_size / 2;
        let features = filters * pooled * pooled;

        let conv_limit = (6.0 / PATCH as f32).sqrt();
        let dense_limit = (6.0 / features as f32).sqrt();

        let conv_w =
            Array2::from_shape_fn((filters, PATCH), |_| rng.random_range(-conv_limit..conv_limit));
        let dense_w = Array2::from_shape_fn((labels.len(), features), |_| {
            rng.random_range(-dense_limit..dense_limit)
        });

        Self {
            conv_b: Array1::zeros(filters),
            dense_b: Array1::zeros(labels.len()),
            labels,
            image_size,
            conv_w,
            dense_w,
            trained_at: Utc::now(),
        }
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn image_size(&self) -> usize {
        self.image_size
    }

    pub fn trained_at(&self) -> DateTime<Utc> {
        self.trained_at
    }

    fn filters(&self) -> usize {
        self.conv_w.nrows()
    }

    /// Class probabilities for one input
    pub fn predict(&self, input: &Array3<f32>) -> Array1<f32> {
        self.forward(input).probs
    }

    pub fn classify(&self, input: &Array3<f32>) -> Prediction {
        let probs = self.predict(input);
        let (best, confidence) = argmax(&probs);

        Prediction {
            label: self.labels[best].clone(),
            confidence,
            probabilities: self
                .labels
                .iter()
                .cloned()
                .zip(probs.iter().copied())
                .collect(),
        }
    }

    /// Per-sample SGD on cross-entropy. Samples are `(input, label_index)`.
    pub fn fit(
        &mut self,
        samples: &[(Array3<f32>, usize)],
        epochs: usize,
        learning_rate: f32,
        rng: &mut StdRng,
    ) -> FitSummary {
        let mut order: Vec<usize> = (0..samples.len()).collect();
        let mut final_loss = 0.0;

        for epoch in 0..epochs {
            order.shuffle(rng);
            let mut epoch_loss = 0.0;

            for &i in &order {
                let (input, target) = &samples[i];
                epoch_loss += self.train_step(input, *target, learning_rate);
            }

            final_loss = epoch_loss / samples.len().max(1) as f32;
            tracing::debug!("epoch {}/{}: loss {:.4}", epoch + 1, epochs, final_loss);
        }

        self.trained_at = Utc::now();
        FitSummary {
            final_loss,
            accuracy: self.accuracy(samples),
        }
    }

    pub fn accuracy(&self, samples: &[(Array3<f32>, usize)]) -> f32 {
        if samples.is_empty() {
            return 0.0;
        }
        let correct = samples
            .iter()
            .filter(|(input, target)| argmax(&self.predict(input)).0 == *target)
            .count();
        correct as f32 / samples.len() as f32
    }

    fn forward(&self, input: &Array3<f32>) -> Activations {
        let size = self.image_size;
        let pooled_side = size / 2;
        let filters = self.filters();

        let patches = im2col(input);
        let conv = patches.dot(&self.conv_w.t()) + &self.conv_b;

        let mut pooled = Array1::zeros(filters * pooled_side * pooled_side);
        let mut pool_argmax = vec![0; pooled.len()];

        for f in 0..filters {
            for pi in 0..pooled_side {
                for pj in 0..pooled_side {
                    let mut best_row = (2 * pi) * size + 2 * pj;
                    let mut best = conv[[best_row, f]].max(0.0);
                    for (dy, dx) in [(0, 1), (1, 0), (1, 1)] {
                        let row = (2 * pi + dy) * size + 2 * pj + dx;
                        let value = conv[[row, f]].max(0.0);
                        if value > best {
                            best = value;
                            best_row = row;
                        }
                    }
                    let idx = f * pooled_side * pooled_side + pi * pooled_side + pj;
                    pooled[idx] = best;
                    pool_argmax[idx] = best_row;
                }
            }
        }

        let logits = self.dense_w.dot(&pooled) + &self.dense_b;
        let probs = softmax(&logits);

        Activations {
            patches,
            conv,
            pooled,
            pool_argmax,
            probs,
        }
    }

    /// One SGD update; returns the sample's loss
    fn train_step(&mut self, input: &Array3<f32>, target: usize, learning_rate: f32) -> f32 {
        let acts = self.forward(input);
        let loss = -(acts.probs[target] + 1e-9).ln();

        let mut d_logits = acts.probs.clone();
        d_logits[target] -= 1.0;

        // Dense layer
        let d_pooled = self.dense_w.t().dot(&d_logits);
        let d_dense_w = outer(&d_logits, &acts.pooled);

        // Route gradients back through max-pool and ReLU
        let pooled_area = (self.image_size / 2) * (self.image_size / 2);
        let mut d_conv = Array2::<f32>::zeros(acts.conv.raw_dim());
        for (idx, &row) in acts.pool_argmax.iter().enumerate() {
            let f = idx / pooled_area;
            if acts.conv[[row, f]] > 0.0 {
                d_conv[[row, f]] += d_pooled[idx];
            }
        }

        let d_conv_w = d_conv.t().dot(&acts.patches);
        let d_conv_b = d_conv.sum_axis(Axis(0));

        self.dense_w.scaled_add(-learning_rate, &d_dense_w);
        self.dense_b.scaled_add(-learning_rate, &d_logits);
        self.conv_w.scaled_add(-learning_rate, &d_conv_w);
        self.conv_b.scaled_add(-learning_rate, &d_conv_b);

        loss
    }

    fn check_shapes(&self) -> Result<(), ModelError> {
        let classes = self.labels.len();
        let pooled = self.image_size / 2;
        let filters = self.filters();

        if classes < 2 {
            return Err(ModelError::Shape("fewer than two labels".to_string()));
        }
        if self.image_size < 2 || self.image_size % 2 != 0 {
            return Err(ModelError::Shape(format!(
                "image size {} is not a positive even number",
                self.image_size
            )));
        }
        if self.conv_w.ncols() != PATCH || self.conv_b.len() != filters {
            return Err(ModelError::Shape("convolution weights".to_string()));
        }
        if self.dense_w.dim() != (classes, filters * pooled * pooled)
            || self.dense_b.len() != classes
        {
            return Err(ModelError::Shape("dense weights".to_string()));
        }
        Ok(())
    }

    /// Write the model as JSON via a temp file and rename
    pub fn save(&self, path: &Path) -> Result<(), ModelError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let tmp = path.with_extension("json.tmp");
        let mut file = std::fs::File::create(&tmp)?;
        serde_json::to_writer(&mut file, self)?;
        file.flush()?;
        file.sync_all()?;
        drop(file);

        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let file = std::fs::File::open(path)?;
        let model: Self = serde_json::from_reader(std::io::BufReader::new(file))?;
        model.check_shapes()?;
        Ok(model)
    }
}

/// Patch matrix for a 3x3 "same" convolution: row `y * W + x` holds the
/// zero-padded neighbourhood of pixel `(y, x)` across all channels.
fn im2col(input: &Array3<f32>) -> Array2<f32> {
    let (channels, height, width) = input.dim();
    let mut cols = Array2::zeros((height * width, channels * KERNEL * KERNEL));

    for y in 0..height {
        for x in 0..width {
            let row = y * width + x;
            for c in 0..channels {
                for dy in 0..KERNEL {
                    for dx in 0..KERNEL {
                        let sy = y as isize + dy as isize - 1;
                        let sx = x as isize + dx as isize - 1;
                        if sy >= 0 && sx >= 0 && (sy as usize) < height && (sx as usize) < width {
                            cols[[row, c * KERNEL * KERNEL + dy * KERNEL + dx]] =
                                input[[c, sy as usize, sx as usize]];
                        }
                    }
                }
            }
        }
    }
    cols
}

fn softmax(logits: &Array1<f32>) -> Array1<f32> {
    let max = logits.fold(f32::NEG_INFINITY, |a, &b| a.max(b));
    let exp = logits.mapv(|v| (v - max).exp());
    let sum = exp.sum();
    exp / sum
}

fn outer(a: &Array1<f32>, b: &Array1<f32>) -> Array2<f32> {
    let column = a.view().insert_axis(Axis(1));
    let row = b.view().insert_axis(Axis(0));
    column.dot(&row)
}

/// Index and value of the largest entry
fn argmax(values: &Array1<f32>) -> (usize, f32) {
    values
        .iter()
        .copied()
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |best, (i, v)| {
            if v > best.1 {
                (i, v)
            } else {
                best
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    const SIZE: usize = 8;

    fn labels() -> Vec<String> {
        vec!["arson".to_string(), "flooding".to_string()]
    }

    /// Noisy reddish (class 0) or bluish (class 1) image
    fn synthetic(class: usize, rng: &mut StdRng) -> Array3<f32> {
        Array3::from_shape_fn((3, SIZE, SIZE), |(c, _, _)| {
            let strong = (class == 0 && c == 0) || (class == 1 && c == 2);
            if strong {
                rng.random_range(0.7..1.0)
            } else {
                rng.random_range(0.0..0.3)
            }
        })
    }

    fn dataset(per_class: usize, rng: &mut StdRng) -> Vec<(Array3<f32>, usize)> {
        (0..per_class)
            .flat_map(|_| [0, 1])
            .map(|class| (synthetic(class, rng), class))
            .collect()
    }

    #[test]
    fn test_softmax_sums_to_one() {
        let probs = softmax(&Array1::from(vec![1.0, 2.0, 3.0, -50.0]));
        assert!((probs.sum() - 1.0).abs() < 1e-5);
        assert!(probs.iter().all(|p| *p >= 0.0));

        // Large logits do not overflow
        let probs = softmax(&Array1::from(vec![1000.0, 1000.0]));
        assert!((probs[0] - 0.5).abs() < 1e-5);
    }

    #[test]
    fn test_im2col_pads_borders() {
        let input = Array3::from_shape_fn((3, 2, 2), |(c, y, x)| (c * 4 + y * 2 + x + 1) as f32);
        let cols = im2col(&input);
        assert_eq!(cols.dim(), (4, PATCH));

        // Pixel (0, 0), channel 0: centre is the pixel itself, top-left is padding
        assert_eq!(cols[[0, 4]], 1.0);
        assert_eq!(cols[[0, 0]], 0.0);
        // Right neighbour of (0, 0) is (0, 1)
        assert_eq!(cols[[0, 5]], 2.0);
    }

    #[test]
    fn test_untrained_prediction_is_a_distribution() {
        let mut rng = StdRng::seed_from_u64(7);
        let net = ConvNet::new(labels(), SIZE, 4, &mut rng);
        let input = synthetic(0, &mut rng);

        let probs = net.predict(&input);
        assert_eq!(probs.len(), 2);
        assert!((probs.sum() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_learns_separable_classes() {
        let mut rng = StdRng::seed_from_u64(42);
        let train = dataset(20, &mut rng);
        let mut net = ConvNet::new(labels(), SIZE, 6, &mut rng);

        let summary = net.fit(&train, 20, 0.01, &mut rng);
        assert!(summary.accuracy >= 0.95, "accuracy {}", summary.accuracy);
        assert!(summary.final_loss < 0.5, "loss {}", summary.final_loss);

        let red = net.classify(&synthetic(0, &mut rng));
        assert_eq!(red.label, "arson");
        let blue = net.classify(&synthetic(1, &mut rng));
        assert_eq!(blue.label, "flooding");
        assert!(blue.confidence > 0.5);
    }

    #[test]
    fn test_prediction_uses_stored_label_order() {
        let mut rng = StdRng::seed_from_u64(1);
        let net = ConvNet::new(
            vec!["zebra".to_string(), "apple".to_string()],
            SIZE,
            2,
            &mut rng,
        );
        let input = synthetic(1, &mut rng);

        let prediction = net.classify(&input);
        let probs = net.predict(&input);
        let expected = if probs[0] >= probs[1] { "zebra" } else { "apple" };
        assert_eq!(prediction.label, expected);
        assert_eq!(prediction.probabilities[0].0, "zebra");
        assert_eq!(prediction.probabilities[1].0, "apple");
    }

    #[test]
    fn test_save_and_load_preserve_predictions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("models/classifier.json");

        let mut rng = StdRng::seed_from_u64(3);
        let net = ConvNet::new(labels(), SIZE, 3, &mut rng);
        net.save(&path).unwrap();
        assert!(!path.with_extension("json.tmp").exists());

        let loaded = ConvNet::load(&path).unwrap();
        assert_eq!(loaded.labels(), net.labels());

        let input = synthetic(0, &mut rng);
        let before = net.predict(&input);
        let after = loaded.predict(&input);
        for (a, b) in before.iter().zip(after.iter()) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn test_load_rejects_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("classifier.json");
        std::fs::write(&path, b"{\"labels\": []}").unwrap();

        assert!(ConvNet::load(&path).is_err());
    }
}
