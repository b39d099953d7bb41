//! Network configuration types.
//!
//! The generation controller treats a model configuration as an opaque value.
//! It only needs to read and rewrite the model identifier, clone the value, and
//! move it through serde. [`ModelConfig`] captures exactly that contract;
//! [`NetworkConfig`] is the dense feed-forward representation shipped with the
//! crate.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Capability boundary between the controller and a model representation.
///
/// `Clone` must produce a deep, independent copy: mutating the clone may never
/// affect the original.
pub trait ModelConfig: Clone + Serialize + DeserializeOwned + Send + Sync {
    /// Identifier this configuration is stored under.
    fn model_id(&self) -> &str;

    /// Re-tag the configuration with a new identifier.
    fn set_model_id(&mut self, id: String);

    /// Whether a loaded configuration is structurally usable.
    fn is_consistent(&self) -> bool {
        true
    }
}

/// Activation function applied to a layer's pre-activations.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    /// Identity.
    Linear,
    /// max(0, x).
    #[default]
    Relu,
    /// 1 / (1 + e^-x).
    Sigmoid,
    /// Hyperbolic tangent.
    Tanh,
    /// Normalized exponential over the whole layer.
    Softmax,
}

/// A fully connected layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LayerConfig {
    /// Number of inputs feeding this layer.
    pub inputs: usize,
    /// Number of neurons in this layer.
    pub outputs: usize,
    /// Row-major weights, `outputs` rows of `inputs` columns.
    pub weights: Vec<f32>,
    /// One bias per output neuron.
    pub biases: Vec<f32>,
    /// Activation applied after the affine transform.
    pub activation: Activation,
}

impl LayerConfig {
    /// Zero-initialized layer.
    pub fn zeros(inputs: usize, outputs: usize, activation: Activation) -> Self {
        Self {
            inputs,
            outputs,
            weights: vec![0.0; inputs * outputs],
            biases: vec![0.0; outputs],
            activation,
        }
    }

    /// Weights feeding output neuron `row`. Empty if the layer is truncated.
    #[inline]
    pub fn row(&self, row: usize) -> &[f32] {
        self.weights
            .get(row * self.inputs..(row + 1) * self.inputs)
            .unwrap_or(&[])
    }
}

/// Descriptive metadata carried with every network.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct NetworkMetadata {
    /// Model identifier, e.g. `model-7`.
    pub model_id: String,
    /// Project the model belongs to.
    pub project_name: String,
}

/// Dense feed-forward network configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NetworkConfig {
    /// Layers in evaluation order; the last one is the output layer.
    pub layers: Vec<LayerConfig>,
    /// Identification metadata.
    pub metadata: NetworkMetadata,
}

impl ModelConfig for NetworkConfig {
    fn model_id(&self) -> &str {
        &self.metadata.model_id
    }

    fn set_model_id(&mut self, id: String) {
        self.metadata.model_id = id;
    }

    /// Consecutive layers line up and every buffer has its declared length.
    fn is_consistent(&self) -> bool {
        !self.layers.is_empty()
            && self.layers.iter().all(|l| {
                l.inputs > 0
                    && l.outputs > 0
                    && l.weights.len() == l.inputs * l.outputs
                    && l.biases.len() == l.outputs
            })
            && self
                .layers
                .windows(2)
                .all(|pair| pair[0].outputs == pair[1].inputs)
    }
}

/// Shape parameters used when creating random networks.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NetworkShape {
    /// Input vector width.
    pub input_size: usize,
    /// Output vector width (number of classes).
    pub output_size: usize,
    /// Output activations; the first entry is applied to the output layer.
    pub output_activations: Vec<Activation>,
    /// Hidden layer widths in order.
    pub hidden_layers: Vec<usize>,
}

impl NetworkShape {
    /// Activation for the output layer, falling back to softmax.
    pub fn output_activation(&self) -> Activation {
        self.output_activations
            .first()
            .copied()
            .unwrap_or(Activation::Softmax)
    }
}
