//! Project configuration for a hill-climbing run.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::{Activation, NetworkShape};

/// Top-level configuration for a project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Project identifier, also used to name the save-state file.
    pub project_name: String,
    /// Input vector width.
    pub input_size: usize,
    /// Number of output classes.
    pub output_size: usize,
    /// Output activation kinds (the first is used for the output layer).
    #[serde(default = "default_output_activations")]
    pub output_activations: Vec<Activation>,
    /// Hidden layer widths for freshly created networks.
    #[serde(default = "default_hidden_layers")]
    pub hidden_layers: Vec<usize>,
    /// Root directory for generation folders and project state.
    #[serde(default = "default_model_location")]
    pub model_location: PathBuf,
    /// Optimization methods requested for this project.
    #[serde(default = "default_methods")]
    pub methods: Vec<OptimizationMethod>,
    /// Layer kinds requested for this project.
    #[serde(default = "default_layer_types")]
    pub layer_types: Vec<LayerType>,
    /// Models per generation (N).
    #[serde(default = "default_population_size")]
    pub population_size: usize,
    /// Survivors kept per generation (K).
    #[serde(default = "default_retention")]
    pub retention: usize,
    /// Apply one mutation pass to every freshly created model.
    #[serde(default = "default_cycle_all_mutations")]
    pub cycle_all_mutations: bool,
    /// Final generation index (exclusive).
    #[serde(default = "default_generations")]
    pub generations: usize,
    /// Save-state file to resume from, if any.
    #[serde(default)]
    pub resume_from: Option<PathBuf>,
    /// What to do when the save-state file exists but cannot be read.
    #[serde(default)]
    pub on_corrupt_state: CorruptStatePolicy,
    /// Mutation parameters applied to offspring.
    #[serde(default)]
    pub mutation: MutationConfig,
    /// Number of parallel evaluations (0 = auto-detect).
    #[serde(default)]
    pub workers: usize,
    /// Random seed for reproducibility.
    #[serde(default)]
    pub random_seed: Option<u64>,
    /// Fraction of the dataset used for evaluation; the rest is held out.
    #[serde(default = "default_train_split")]
    pub train_split: f32,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            project_name: "AIModelTestProject".to_string(),
            input_size: 28 * 28,
            output_size: 10,
            output_activations: default_output_activations(),
            hidden_layers: default_hidden_layers(),
            model_location: default_model_location(),
            methods: default_methods(),
            layer_types: default_layer_types(),
            population_size: default_population_size(),
            retention: default_retention(),
            cycle_all_mutations: default_cycle_all_mutations(),
            generations: default_generations(),
            resume_from: None,
            on_corrupt_state: CorruptStatePolicy::default(),
            mutation: MutationConfig::default(),
            workers: 0,
            random_seed: None,
            train_split: default_train_split(),
        }
    }
}

fn default_output_activations() -> Vec<Activation> {
    vec![Activation::Softmax]
}
fn default_hidden_layers() -> Vec<usize> {
    vec![16]
}
fn default_model_location() -> PathBuf {
    PathBuf::from("models")
}
fn default_methods() -> Vec<OptimizationMethod> {
    vec![OptimizationMethod::HillClimb]
}
fn default_layer_types() -> Vec<LayerType> {
    vec![LayerType::Ffnn]
}
fn default_population_size() -> usize {
    50
}
fn default_retention() -> usize {
    5
}
fn default_cycle_all_mutations() -> bool {
    true
}
fn default_generations() -> usize {
    500
}
fn default_train_split() -> f32 {
    0.8
}

/// Optimization method names accepted in configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum OptimizationMethod {
    #[serde(rename = "HillClimb")]
    HillClimb,
    #[serde(rename = "NEAT")]
    Neat,
    #[serde(rename = "DNAS")]
    Dnas,
    #[serde(rename = "NAS")]
    Nas,
}

impl OptimizationMethod {
    /// Whether the generation controller implements this method.
    pub fn is_supported(self) -> bool {
        matches!(self, Self::HillClimb)
    }
}

/// Layer kinds accepted in configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum LayerType {
    #[serde(rename = "FFNN")]
    Ffnn,
    #[serde(rename = "LSTM")]
    Lstm,
    #[serde(rename = "CNN")]
    Cnn,
}

impl LayerType {
    /// Whether the network factory can build this layer kind.
    pub fn is_supported(self) -> bool {
        matches!(self, Self::Ffnn)
    }
}

/// Policy for a save-state file that exists but fails to load.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum CorruptStatePolicy {
    /// Back the file up and start a fresh project.
    #[default]
    Fallback,
    /// Refuse to start.
    Abort,
}

/// Mutation parameters handed to the mutator for every offspring.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct MutationConfig {
    /// Scale of the perturbation applied to a mutated parameter.
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f32,
    /// Chance, in percent, that any given parameter is perturbed.
    #[serde(default = "default_mutation_rate")]
    pub mutation_rate: f32,
}

impl Default for MutationConfig {
    fn default() -> Self {
        Self {
            learning_rate: default_learning_rate(),
            mutation_rate: default_mutation_rate(),
        }
    }
}

fn default_learning_rate() -> f32 {
    0.01
}
fn default_mutation_rate() -> f32 {
    20.0
}

impl ProjectConfig {
    /// Shape used by the config factory for first-generation networks.
    pub fn network_shape(&self) -> NetworkShape {
        NetworkShape {
            input_size: self.input_size,
            output_size: self.output_size,
            output_activations: self.output_activations.clone(),
            hidden_layers: self.hidden_layers.clone(),
        }
    }

    /// Validate configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.project_name.trim().is_empty() {
            return Err(ConfigError::EmptyProjectName);
        }
        if self.input_size == 0 || self.output_size == 0 {
            return Err(ConfigError::InvalidDimensions);
        }
        if self.population_size == 0 {
            return Err(ConfigError::EmptyPopulation);
        }
        if self.retention == 0 || self.retention > self.population_size {
            return Err(ConfigError::InvalidRetention {
                retention: self.retention,
                population: self.population_size,
            });
        }
        if let Some(layer) = self.hidden_layers.iter().position(|&w| w == 0) {
            return Err(ConfigError::EmptyHiddenLayer(layer));
        }
        if !(self.train_split > 0.0 && self.train_split <= 1.0) {
            return Err(ConfigError::InvalidSplit(self.train_split));
        }
        let m = &self.mutation;
        if !m.learning_rate.is_finite() || m.learning_rate < 0.0 {
            return Err(ConfigError::InvalidMutation(format!(
                "learning rate {} must be finite and non-negative",
                m.learning_rate
            )));
        }
        if !m.mutation_rate.is_finite() || !(0.0..=100.0).contains(&m.mutation_rate) {
            return Err(ConfigError::InvalidMutation(format!(
                "mutation rate {} must be a percentage",
                m.mutation_rate
            )));
        }
        Ok(())
    }
}

/// Configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Project name must not be empty")]
    EmptyProjectName,
    #[error("Input and output sizes must be non-zero")]
    InvalidDimensions,
    #[error("Population size must be non-zero")]
    EmptyPopulation,
    #[error("Retention count {retention} must be between 1 and the population size {population}")]
    InvalidRetention { retention: usize, population: usize },
    #[error("Hidden layer {0} has zero width")]
    EmptyHiddenLayer(usize),
    #[error("Train split {0} must be in (0, 1]")]
    InvalidSplit(f32),
    #[error("Invalid mutation parameters: {0}")]
    InvalidMutation(String),
}
