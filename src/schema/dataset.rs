//! Labeled datasets and the providers that supply them.

use std::fs;
use std::path::{Path, PathBuf};

use rand::prelude::*;
use rand_distr::Normal;
use serde::{Deserialize, Serialize};

/// Ordered samples with parallel ordered labels.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Dataset {
    /// Fixed-width input vectors.
    samples: Vec<Vec<f32>>,
    /// Class index for each sample.
    labels: Vec<usize>,
}

impl Dataset {
    /// Build a dataset, checking that samples and labels line up.
    pub fn new(samples: Vec<Vec<f32>>, labels: Vec<usize>) -> Result<Self, DatasetError> {
        if samples.len() != labels.len() {
            return Err(DatasetError::LengthMismatch {
                samples: samples.len(),
                labels: labels.len(),
            });
        }
        if let Some(first) = samples.first() {
            let width = first.len();
            if let Some(index) = samples.iter().position(|s| s.len() != width) {
                return Err(DatasetError::RaggedSample {
                    index,
                    expected: width,
                    found: samples[index].len(),
                });
            }
        }
        Ok(Self { samples, labels })
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Check if the dataset has no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Width of each sample (0 for an empty dataset).
    pub fn input_size(&self) -> usize {
        self.samples.first().map_or(0, Vec::len)
    }

    /// Iterate over `(sample, label)` pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (&[f32], usize)> {
        self.samples
            .iter()
            .zip(self.labels.iter())
            .map(|(s, &l)| (s.as_slice(), l))
    }

    /// Divide every value by `scale` (e.g. 255 for raw pixel bytes).
    pub fn normalize(&mut self, scale: f32) {
        if scale == 0.0 {
            return;
        }
        let inv = 1.0 / scale;
        for sample in &mut self.samples {
            for v in sample.iter_mut() {
                *v *= inv;
            }
        }
    }

    /// Split into a leading `ratio` fraction and the remainder, preserving order.
    pub fn split(&self, ratio: f32) -> DatasetSplit {
        let ratio = ratio.clamp(0.0, 1.0);
        let split_index = ((self.len() as f64) * ratio as f64) as usize;
        DatasetSplit {
            train: Self {
                samples: self.samples[..split_index].to_vec(),
                labels: self.labels[..split_index].to_vec(),
            },
            validation: Self {
                samples: self.samples[split_index..].to_vec(),
                labels: self.labels[split_index..].to_vec(),
            },
        }
    }
}

/// Train and held-out partitions of a dataset.
#[derive(Debug, Clone, Default)]
pub struct DatasetSplit {
    pub train: Dataset,
    pub validation: Dataset,
}

/// Supplies an immutable dataset to the driver.
pub trait DatasetProvider {
    /// Load the full dataset.
    fn load(&self) -> Result<Dataset, DatasetError>;
}

/// Reads a dataset from a JSON file of the form
/// `{"samples": [[...], ...], "labels": [...]}`.
#[derive(Debug, Clone)]
pub struct JsonDatasetProvider {
    path: PathBuf,
    scale: Option<f32>,
}

impl JsonDatasetProvider {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            scale: None,
        }
    }

    /// Normalize loaded values by dividing by `scale`.
    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = Some(scale);
        self
    }
}

impl DatasetProvider for JsonDatasetProvider {
    fn load(&self) -> Result<Dataset, DatasetError> {
        let content = fs::read_to_string(&self.path).map_err(|source| DatasetError::Io {
            path: self.path.clone(),
            source,
        })?;
        let raw: Dataset = serde_json::from_str(&content).map_err(|source| DatasetError::Json {
            path: self.path.clone(),
            source,
        })?;
        // Re-run shape checks; deserialization bypasses `new`.
        let mut dataset = Dataset::new(raw.samples, raw.labels)?;
        if let Some(scale) = self.scale {
            dataset.normalize(scale);
        }
        Ok(dataset)
    }
}

/// Seeded Gaussian clusters, one per class, shuffled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyntheticDataset {
    /// Number of classes.
    pub classes: usize,
    /// Width of each sample.
    pub features: usize,
    /// Samples drawn per class.
    pub samples_per_class: usize,
    /// Standard deviation around each class center.
    pub spread: f32,
    /// Random seed.
    pub seed: u64,
}

impl Default for SyntheticDataset {
    fn default() -> Self {
        Self {
            classes: 10,
            features: 28 * 28,
            samples_per_class: 50,
            spread: 0.15,
            seed: 42,
        }
    }
}

impl DatasetProvider for SyntheticDataset {
    fn load(&self) -> Result<Dataset, DatasetError> {
        if self.classes == 0 || self.features == 0 {
            return Err(DatasetError::Empty);
        }
        let noise = Normal::new(0.0f32, self.spread.max(0.0))
            .map_err(|e| DatasetError::Generator(e.to_string()))?;
        let mut rng = StdRng::seed_from_u64(self.seed);

        let centers: Vec<Vec<f32>> = (0..self.classes)
            .map(|_| (0..self.features).map(|_| rng.r#gen::<f32>()).collect())
            .collect();

        let mut pairs: Vec<(Vec<f32>, usize)> =
            Vec::with_capacity(self.classes * self.samples_per_class);
        for (label, center) in centers.iter().enumerate() {
            for _ in 0..self.samples_per_class {
                let sample = center
                    .iter()
                    .map(|&c| (c + noise.sample(&mut rng)).clamp(0.0, 1.0))
                    .collect();
                pairs.push((sample, label));
            }
        }
        pairs.shuffle(&mut rng);

        let (samples, labels) = pairs.into_iter().unzip();
        Dataset::new(samples, labels)
    }
}

/// Dataset loading errors.
#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("Failed to read dataset {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse dataset {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Dataset has {samples} samples but {labels} labels")]
    LengthMismatch { samples: usize, labels: usize },
    #[error("Sample {index} has width {found}, expected {expected}")]
    RaggedSample {
        index: usize,
        expected: usize,
        found: usize,
    },
    #[error("Dataset generator needs at least one class and one feature")]
    Empty,
    #[error("Dataset generator failed: {0}")]
    Generator(String),
}
