//! Evolution record types: per-model scores, generation snapshots and the
//! resumable project history.
//!
//! Every persisted type here is field-tagged JSON. Fields added after the first
//! release carry `#[serde(default)]` so older save files keep loading.

use serde::{Deserialize, Serialize};

/// Fitness record for one model in one generation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelRecord {
    /// Model identifier, unique within its generation.
    pub model_name: String,
    /// Fraction of samples classified correctly, in [0, 1].
    pub accuracy: f64,
    /// Loss on the evaluation split, if the evaluator reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub training_loss: Option<f64>,
    /// Loss on the held-out split, if one was evaluated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_loss: Option<f64>,
}

impl ModelRecord {
    /// Create a record, coercing the accuracy into [0, 1].
    pub fn new(model_name: impl Into<String>, accuracy: f64) -> Self {
        let accuracy = if accuracy.is_finite() {
            accuracy.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            model_name: model_name.into(),
            accuracy,
            training_loss: None,
            validation_loss: None,
        }
    }

    /// Attach auxiliary loss metrics.
    pub fn with_losses(mut self, training: Option<f64>, validation: Option<f64>) -> Self {
        self.training_loss = training;
        self.validation_loss = validation;
        self
    }
}

/// Top-K records of a completed generation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenerationSnapshot {
    /// Generation index.
    pub generation: usize,
    /// Retained records, best first.
    pub models: Vec<ModelRecord>,
}

impl GenerationSnapshot {
    /// Best record of the generation.
    pub fn best(&self) -> Option<&ModelRecord> {
        self.models.first()
    }
}

/// Durable, resumable state of a project.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ProjectHistory {
    /// Project identifier.
    pub project_name: String,
    /// Configured population size.
    pub num_models: usize,
    /// Whether fresh models received a mutation pass at creation.
    pub cycle_all_mutations: bool,
    /// One snapshot per completed generation.
    pub history: Vec<GenerationSnapshot>,
    /// Number of snapshots appended so far.
    pub total_generations: usize,
    /// Next generation to run.
    #[serde(default)]
    pub current_generation: usize,
    /// Latest best network configuration, kept opaque.
    #[serde(default)]
    pub model_config: Option<serde_json::Value>,
    /// Base seed used to derive per-generation random streams.
    #[serde(default)]
    pub random_seed: Option<u64>,
}

impl ProjectHistory {
    /// Empty history for a fresh project.
    pub fn new(project_name: impl Into<String>, num_models: usize, cycle_all_mutations: bool) -> Self {
        Self {
            project_name: project_name.into(),
            num_models,
            cycle_all_mutations,
            ..Default::default()
        }
    }

    /// Append a generation snapshot.
    pub fn record_generation(&mut self, snapshot: GenerationSnapshot) {
        self.history.push(snapshot);
        self.total_generations += 1;
    }

    /// Best record across all recorded generations.
    pub fn best_overall(&self) -> Option<&ModelRecord> {
        self.history
            .iter()
            .filter_map(GenerationSnapshot::best)
            .fold(None, |best: Option<&ModelRecord>, record| match best {
                Some(b) if b.accuracy >= record.accuracy => Some(b),
                _ => Some(record),
            })
    }

    /// History-only view written next to the save state.
    pub fn export(&self) -> HistoryExport<'_> {
        HistoryExport {
            project_name: &self.project_name,
            total_generations: self.total_generations,
            history: &self.history,
        }
    }
}

/// Serialized form of the history export.
#[derive(Debug, Serialize)]
pub struct HistoryExport<'a> {
    pub project_name: &'a str,
    pub total_generations: usize,
    pub history: &'a [GenerationSnapshot],
}

// ============================================================================
// Progress and Result Types
// ============================================================================

/// Progress update emitted by the generation controller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionProgress {
    /// Generation being processed.
    pub generation: usize,
    /// Final generation index (exclusive).
    pub final_generation: usize,
    /// Records available for this generation.
    pub evaluations_completed: usize,
    /// Population slots in this generation.
    pub evaluations_total: usize,
    /// Best fitness of this generation, once ranked.
    pub generation_best: Option<f64>,
    /// Best fitness recorded in the project so far.
    pub best_fitness: Option<f64>,
    /// Current phase of the loop.
    pub phase: EvolutionPhase,
}

/// Phase of the generation loop.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum EvolutionPhase {
    /// Creating the first population (generation 0 only).
    #[default]
    Initializing,
    /// Evaluating candidates.
    Evaluating,
    /// Creating offspring.
    Reproducing,
    /// Generation persisted.
    Checkpointed,
    /// Loop finished.
    Complete,
    /// Loop stopped early.
    Stopped,
}

/// Outcome of a call to `run_generations`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    /// Generation the run started from.
    pub start_generation: usize,
    /// Generation the project will resume from next.
    pub next_generation: usize,
    /// Generations completed during this run.
    pub generations_completed: usize,
    /// Evaluator invocations made during this run.
    pub evaluations: u64,
    /// Best record in the project history.
    pub best: Option<ModelRecord>,
    /// Wall-clock time (in seconds).
    pub elapsed_seconds: f64,
    /// Reason the loop stopped.
    pub stop_reason: StopReason,
}

/// Reason the generation loop stopped.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum StopReason {
    /// Reached the final generation index.
    Completed,
    /// Cancelled through the cancel handle.
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_coerces_accuracy() {
        assert_eq!(ModelRecord::new("m", 1.5).accuracy, 1.0);
        assert_eq!(ModelRecord::new("m", -0.1).accuracy, 0.0);
        assert_eq!(ModelRecord::new("m", f64::NAN).accuracy, 0.0);
        assert_eq!(ModelRecord::new("m", 0.25).accuracy, 0.25);
    }

    #[test]
    fn test_optional_losses_omitted() {
        let json = serde_json::to_string(&ModelRecord::new("model-1", 0.5)).unwrap();
        assert!(!json.contains("training_loss"));
        assert!(!json.contains("validation_loss"));

        let with_loss = ModelRecord::new("model-1", 0.5).with_losses(Some(0.1), None);
        let json = serde_json::to_string(&with_loss).unwrap();
        assert!(json.contains("training_loss"));
    }

    #[test]
    fn test_history_counts_generations() {
        let mut history = ProjectHistory::new("p", 4, false);
        history.record_generation(GenerationSnapshot {
            generation: 0,
            models: vec![ModelRecord::new("model-2", 0.4)],
        });
        history.record_generation(GenerationSnapshot {
            generation: 1,
            models: vec![ModelRecord::new("model-1", 0.7)],
        });
        assert_eq!(history.total_generations, history.history.len());
        assert_eq!(history.best_overall().unwrap().accuracy, 0.7);
    }

    #[test]
    fn test_older_save_state_loads() {
        // Written before current_generation, model_config and random_seed existed.
        let json = r#"{
            "project_name": "legacy",
            "num_models": 10,
            "cycle_all_mutations": true,
            "history": [{"generation": 0, "models": [{"model_name": "model-3", "accuracy": 0.5}]}],
            "total_generations": 1
        }"#;
        let history: ProjectHistory = serde_json::from_str(json).unwrap();
        assert_eq!(history.current_generation, 0);
        assert!(history.model_config.is_none());
        assert_eq!(history.history[0].models[0].model_name, "model-3");
    }
}
