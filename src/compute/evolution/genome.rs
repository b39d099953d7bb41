//! Network creation and mutation for the hill-climbing search.
//!
//! All randomness flows through an explicit [`NetworkRng`]; nothing here
//! touches a process-wide generator.

use rand::prelude::*;
use rand_distr::{Normal, StandardNormal};

use crate::schema::{
    Activation, LayerConfig, ModelConfig, NetworkConfig, NetworkMetadata, NetworkShape,
};

/// Random number generator wrapper for network operations.
pub struct NetworkRng {
    rng: StdRng,
}

impl NetworkRng {
    /// Create from seed.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Stream for one generation, derived from a project's base seed.
    ///
    /// Depends only on `(base_seed, generation)`, so a resumed run draws the
    /// same numbers as an uninterrupted one.
    pub fn for_generation(base_seed: u64, generation: usize) -> Self {
        let mixed = base_seed ^ (generation as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15);
        Self::new(mixed)
    }

    /// Uniform sample in [0, 1).
    pub fn unit(&mut self) -> f32 {
        self.rng.r#gen::<f32>()
    }

    /// Standard normal sample.
    pub fn standard_normal(&mut self) -> f32 {
        self.rng.sample(StandardNormal)
    }

    /// Sample from N(0, std).
    fn normal(&mut self, std: f32) -> f32 {
        match Normal::new(0.0f32, std) {
            Ok(dist) => dist.sample(&mut self.rng),
            Err(_) => 0.0,
        }
    }
}

/// Creates randomly initialized configurations for the first generation.
pub trait ConfigFactory<C>: Send + Sync {
    fn create_random(
        &self,
        shape: &NetworkShape,
        model_id: &str,
        project_name: &str,
        rng: &mut NetworkRng,
    ) -> C;
}

/// Perturbs a configuration **in place**.
///
/// The controller always hands the mutator its own deep copy, so an
/// implementation may freely modify the value it receives.
pub trait Mutator<C>: Send + Sync {
    fn mutate(
        &self,
        config: &mut C,
        learning_rate: f32,
        mutation_rate: f32,
        rng: &mut NetworkRng,
    );
}

/// He-initialized dense networks.
#[derive(Debug, Clone, Copy, Default)]
pub struct DenseFactory;

impl ConfigFactory<NetworkConfig> for DenseFactory {
    fn create_random(
        &self,
        shape: &NetworkShape,
        model_id: &str,
        project_name: &str,
        rng: &mut NetworkRng,
    ) -> NetworkConfig {
        let mut widths = Vec::with_capacity(shape.hidden_layers.len() + 2);
        widths.push(shape.input_size);
        widths.extend_from_slice(&shape.hidden_layers);
        widths.push(shape.output_size);

        let last = widths.len() - 2;
        let layers = widths
            .windows(2)
            .enumerate()
            .map(|(i, pair)| {
                let activation = if i == last {
                    shape.output_activation()
                } else {
                    Activation::Relu
                };
                random_layer(pair[0], pair[1], activation, rng)
            })
            .collect();

        NetworkConfig {
            layers,
            metadata: NetworkMetadata {
                model_id: model_id.to_string(),
                project_name: project_name.to_string(),
            },
        }
    }
}

/// Generate a random layer with He-scaled weights and zero biases.
fn random_layer(
    inputs: usize,
    outputs: usize,
    activation: Activation,
    rng: &mut NetworkRng,
) -> LayerConfig {
    let std = (2.0 / inputs.max(1) as f32).sqrt();
    let mut layer = LayerConfig::zeros(inputs, outputs, activation);
    for w in &mut layer.weights {
        *w = rng.normal(std);
    }
    layer
}

/// Gaussian point mutation of weights and biases.
///
/// Every parameter is perturbed with probability `mutation_rate` percent by
/// `learning_rate * N(0, 1)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct GaussianMutator;

impl Mutator<NetworkConfig> for GaussianMutator {
    fn mutate(
        &self,
        config: &mut NetworkConfig,
        learning_rate: f32,
        mutation_rate: f32,
        rng: &mut NetworkRng,
    ) {
        let chance = (mutation_rate / 100.0).clamp(0.0, 1.0);
        for layer in &mut config.layers {
            for value in layer.weights.iter_mut().chain(layer.biases.iter_mut()) {
                if rng.unit() < chance {
                    *value += learning_rate * rng.standard_normal();
                }
            }
        }
    }
}

/// Clone a survivor into a fresh, re-tagged offspring.
pub fn offspring_of<C: ModelConfig>(survivor: &C, model_id: String) -> C {
    let mut child = survivor.clone();
    child.set_model_id(model_id);
    child
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shape() -> NetworkShape {
        NetworkShape {
            input_size: 6,
            output_size: 3,
            output_activations: vec![Activation::Softmax],
            hidden_layers: vec![4],
        }
    }

    #[test]
    fn test_random_network() {
        let mut rng = NetworkRng::new(42);
        let net = DenseFactory.create_random(&shape(), "model-1", "proj", &mut rng);

        assert!(net.is_consistent());
        assert_eq!(net.layers.len(), 2);
        assert_eq!(net.layers[0].inputs, 6);
        assert_eq!(net.layers[1].outputs, 3);
        assert_eq!(net.layers[0].activation, Activation::Relu);
        assert_eq!(net.layers[1].activation, Activation::Softmax);
        assert_eq!(net.model_id(), "model-1");
        assert_eq!(net.metadata.project_name, "proj");
    }

    #[test]
    fn test_factory_is_deterministic_per_seed() {
        let a = DenseFactory.create_random(&shape(), "m", "p", &mut NetworkRng::new(3));
        let b = DenseFactory.create_random(&shape(), "m", "p", &mut NetworkRng::new(3));
        let c = DenseFactory.create_random(&shape(), "m", "p", &mut NetworkRng::new(4));
        assert_eq!(a, b);
        assert_ne!(a.layers, c.layers);
    }

    #[test]
    fn test_no_hidden_layers() {
        let shape = NetworkShape {
            hidden_layers: vec![],
            ..shape()
        };
        let net = DenseFactory.create_random(&shape, "m", "p", &mut NetworkRng::new(1));
        assert_eq!(net.layers.len(), 1);
        assert_eq!(net.layers[0].activation, Activation::Softmax);
    }

    #[test]
    fn test_mutation_rates() {
        let mut rng = NetworkRng::new(42);
        let original = DenseFactory.create_random(&shape(), "m", "p", &mut rng);

        let mut untouched = original.clone();
        GaussianMutator.mutate(&mut untouched, 0.5, 0.0, &mut rng);
        assert_eq!(untouched, original);

        let mut mutated = original.clone();
        GaussianMutator.mutate(&mut mutated, 0.5, 100.0, &mut rng);
        let changed = mutated.layers[0]
            .weights
            .iter()
            .zip(&original.layers[0].weights)
            .filter(|(a, b)| a != b)
            .count();
        assert_eq!(changed, original.layers[0].weights.len());
    }

    #[test]
    fn test_offspring_is_independent() {
        let mut rng = NetworkRng::new(9);
        let survivor = DenseFactory.create_random(&shape(), "model-4", "p", &mut rng);
        let snapshot = survivor.clone();

        let mut child = offspring_of(&survivor, "model-1".to_string());
        GaussianMutator.mutate(&mut child, 1.0, 100.0, &mut rng);

        assert_eq!(survivor, snapshot);
        assert_eq!(child.model_id(), "model-1");
        assert_ne!(survivor.layers, child.layers);
    }

    #[test]
    fn test_generation_streams() {
        let mut a = NetworkRng::for_generation(11, 3);
        let mut b = NetworkRng::for_generation(11, 3);
        let mut c = NetworkRng::for_generation(11, 4);
        let draw = |rng: &mut NetworkRng| -> Vec<f32> { (0..4).map(|_| rng.unit()).collect() };
        let (x, y, z) = (draw(&mut a), draw(&mut b), draw(&mut c));
        assert_eq!(x, y);
        assert_ne!(x, z);
    }
}
