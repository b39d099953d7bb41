//! Fitness evaluation of model configurations against a labeled dataset.

use crate::compute::{argmax, feedforward, softmax_inplace};
use crate::schema::{Activation, Dataset, NetworkConfig};

/// Scores a configuration against a dataset.
///
/// Implementations must be deterministic: the same configuration and dataset
/// always produce the same fitness. The controller relies on this to treat a
/// cached record as equivalent to re-running the evaluation.
pub trait NetworkEvaluator<C>: Send + Sync {
    /// Fitness in [0, 1].
    fn evaluate(&self, config: &C, data: &Dataset) -> f64;

    /// Optional loss on the same data.
    fn loss(&self, _config: &C, _data: &Dataset) -> Option<f64> {
        None
    }
}

/// Classification accuracy of a dense network.
///
/// The prediction is the index of the largest output; the first maximal
/// output wins ties.
#[derive(Debug, Clone, Copy, Default)]
pub struct AccuracyEvaluator {
    /// Also report mean cross-entropy as the loss.
    pub with_loss: bool,
}

impl AccuracyEvaluator {
    /// Create a new accuracy evaluator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Report cross-entropy loss alongside accuracy.
    pub fn with_loss(mut self) -> Self {
        self.with_loss = true;
        self
    }
}

impl NetworkEvaluator<NetworkConfig> for AccuracyEvaluator {
    fn evaluate(&self, config: &NetworkConfig, data: &Dataset) -> f64 {
        if data.is_empty() {
            return 0.0;
        }

        let correct = data
            .iter()
            .filter(|(sample, label)| argmax(&feedforward(config, sample)) == Some(*label))
            .count();

        correct as f64 / data.len() as f64
    }

    fn loss(&self, config: &NetworkConfig, data: &Dataset) -> Option<f64> {
        if !self.with_loss || data.is_empty() {
            return None;
        }
        let output_is_softmax = config
            .layers
            .last()
            .is_some_and(|l| l.activation == Activation::Softmax);

        let total: f64 = data
            .iter()
            .map(|(sample, label)| {
                let mut probs = feedforward(config, sample);
                if !output_is_softmax {
                    softmax_inplace(&mut probs);
                }
                let p = probs.get(label).copied().unwrap_or(0.0).max(1e-7);
                -(p as f64).ln()
            })
            .sum();

        Some(total / data.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{LayerConfig, NetworkMetadata};

    /// Predicts class 0 when x0 > x1, else class 1.
    fn comparator() -> NetworkConfig {
        let mut layer = LayerConfig::zeros(2, 2, Activation::Softmax);
        layer.weights = vec![1.0, 0.0, 0.0, 1.0];
        NetworkConfig {
            layers: vec![layer],
            metadata: NetworkMetadata::default(),
        }
    }

    fn data() -> Dataset {
        Dataset::new(
            vec![
                vec![1.0, 0.0],
                vec![0.0, 1.0],
                vec![0.9, 0.1],
                vec![0.2, 0.8],
            ],
            vec![0, 1, 1, 1],
        )
        .unwrap()
    }

    #[test]
    fn test_accuracy() {
        let acc = AccuracyEvaluator::new().evaluate(&comparator(), &data());
        assert!((acc - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_empty_dataset() {
        let empty = Dataset::default();
        assert_eq!(AccuracyEvaluator::new().evaluate(&comparator(), &empty), 0.0);
        assert!(AccuracyEvaluator::new().with_loss().loss(&comparator(), &empty).is_none());
    }

    #[test]
    fn test_ties_pick_first_class() {
        // All-zero network outputs a uniform distribution; argmax picks class 0.
        let mut net = comparator();
        net.layers[0].weights = vec![0.0; 4];
        let acc = AccuracyEvaluator::new().evaluate(&net, &data());
        assert!((acc - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_loss_reported_only_when_enabled() {
        assert!(AccuracyEvaluator::new().loss(&comparator(), &data()).is_none());

        let loss = AccuracyEvaluator::new()
            .with_loss()
            .loss(&comparator(), &data())
            .unwrap();
        assert!(loss > 0.0);
        assert!(loss.is_finite());
    }

    #[test]
    fn test_deterministic() {
        let eval = AccuracyEvaluator::new();
        let a = eval.evaluate(&comparator(), &data());
        let b = eval.evaluate(&comparator(), &data());
        assert_eq!(a, b);
    }
}
