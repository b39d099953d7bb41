//! Generation controller: the resumable hill-climbing loop.
//!
//! Each generation lives in its own namespace directory. A generation is
//! evaluated (skipping models already in its cache), ranked, snapshotted into
//! the project history, and used to populate the next namespace. The project
//! history is persisted at every generation boundary, so an interrupted run
//! resumes at the first generation that never reached its checkpoint.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use log::{debug, error, info, warn};
use rayon::prelude::*;

use crate::schema::{
    ConfigError, CorruptStatePolicy, Dataset, EvolutionPhase, EvolutionProgress,
    GenerationSnapshot, ModelConfig, ModelRecord, NetworkConfig, ProjectConfig, ProjectHistory,
    RunSummary, StopReason,
};
use crate::storage::{
    StorageError, StorageLayout, backup_corrupt_state, export_history, load_model_config,
    load_project_state, model_name, save_model_config, save_project_state,
};

use super::cache::EvaluationCache;
use super::fitness::{AccuracyEvaluator, NetworkEvaluator};
use super::genome::{ConfigFactory, DenseFactory, GaussianMutator, Mutator, NetworkRng};
use super::ranking::{rank, top_k};
use super::selection::SelectionPolicy;

/// Fatal conditions of a run.
#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("Save state {path} could not be loaded: {source}")]
    CorruptState {
        path: PathBuf,
        #[source]
        source: StorageError,
    },
    #[error("Generation {0} has no evaluated models")]
    EmptyGeneration(usize),
    #[error("Failed to build worker pool: {0}")]
    ThreadPool(String),
    #[error("Evaluation cache of generation {generation} could not be persisted: {source}")]
    CachePersist {
        generation: usize,
        #[source]
        source: StorageError,
    },
}

/// Project configuration together with its (fresh or resumed) history.
#[derive(Debug, Clone)]
pub struct ManagerState {
    pub config: ProjectConfig,
    pub history: ProjectHistory,
    /// Whether `history` was loaded from a save file.
    pub resumed: bool,
}

impl ManagerState {
    /// Validate `config` and load its save state, if any.
    pub fn init(config: ProjectConfig) -> Result<Self, ControllerError> {
        config.validate()?;
        log_requested_methods(&config);

        let loaded = match &config.resume_from {
            Some(path) => load_saved_history(path, config.on_corrupt_state)?,
            None => None,
        };

        let (mut history, resumed) = match loaded {
            Some(history) => (history, true),
            None => (
                ProjectHistory::new(
                    config.project_name.clone(),
                    config.population_size,
                    config.cycle_all_mutations,
                ),
                false,
            ),
        };

        if resumed {
            if history.project_name != config.project_name {
                warn!(
                    "Save state belongs to project '{}', continuing as '{}'",
                    history.project_name, config.project_name
                );
                history.project_name = config.project_name.clone();
            }
            if history.num_models != config.population_size {
                warn!(
                    "Save state was created with {} models, continuing with {}",
                    history.num_models, config.population_size
                );
                history.num_models = config.population_size;
            }
            info!(
                "Resuming project '{}' at generation {}",
                history.project_name, history.current_generation
            );
        } else {
            info!("Starting fresh project '{}'", config.project_name);
        }

        if history.random_seed.is_none() {
            history.random_seed = Some(config.random_seed.unwrap_or_else(rand::random));
        }

        Ok(Self {
            config,
            history,
            resumed,
        })
    }

    /// Storage layout of the project.
    pub fn layout(&self) -> StorageLayout {
        StorageLayout::new(&self.config.model_location, &self.config.project_name)
    }

    fn seed(&self) -> u64 {
        self.history.random_seed.unwrap_or_default()
    }
}

fn log_requested_methods(config: &ProjectConfig) {
    for method in &config.methods {
        if method.is_supported() {
            info!("Optimization method: {:?}", method);
        } else {
            warn!("Optimization method {:?} is not implemented and will be ignored", method);
        }
    }
    for layer in &config.layer_types {
        if layer.is_supported() {
            info!("Layer type: {:?}", layer);
        } else {
            warn!("Layer type {:?} is not implemented and will be ignored", layer);
        }
    }
}

fn load_saved_history(
    path: &Path,
    policy: CorruptStatePolicy,
) -> Result<Option<ProjectHistory>, ControllerError> {
    match load_project_state(path) {
        Ok(Some(history)) => Ok(Some(history)),
        Ok(None) => {
            info!("No save state at {}, starting fresh", path.display());
            Ok(None)
        }
        Err(source) => match policy {
            CorruptStatePolicy::Abort => Err(ControllerError::CorruptState {
                path: path.to_path_buf(),
                source,
            }),
            CorruptStatePolicy::Fallback => {
                let backup =
                    backup_corrupt_state(path).map_err(|_| ControllerError::CorruptState {
                        path: path.to_path_buf(),
                        source,
                    })?;
                warn!(
                    "Save state {} could not be loaded, backed up to {} and starting fresh",
                    path.display(),
                    backup.display()
                );
                Ok(None)
            }
        },
    }
}

/// Pluggable network operations used by the controller.
pub struct Capabilities<C> {
    pub factory: Box<dyn ConfigFactory<C>>,
    pub evaluator: Box<dyn NetworkEvaluator<C>>,
    pub mutator: Box<dyn Mutator<C>>,
}

impl Capabilities<NetworkConfig> {
    /// Dense networks scored by classification accuracy.
    pub fn dense() -> Self {
        Self {
            factory: Box::new(DenseFactory),
            evaluator: Box::new(AccuracyEvaluator::new().with_loss()),
            mutator: Box::new(GaussianMutator),
        }
    }
}

/// Cache shared by the evaluation workers.
struct SharedCache {
    cache: EvaluationCache,
    persist_error: Option<StorageError>,
}

fn lock(shared: &Mutex<SharedCache>) -> MutexGuard<'_, SharedCache> {
    shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Runs generations of the hill-climbing search.
pub struct GenerationController<C> {
    state: ManagerState,
    layout: StorageLayout,
    capabilities: Capabilities<C>,
    validation: Option<Dataset>,
    cancelled: Arc<AtomicBool>,
    evaluations: Arc<AtomicU64>,
}

impl<C: ModelConfig> GenerationController<C> {
    /// Create a controller over a prepared state.
    pub fn new(state: ManagerState, capabilities: Capabilities<C>) -> Self {
        let layout = state.layout();
        Self {
            state,
            layout,
            capabilities,
            validation: None,
            cancelled: Arc::new(AtomicBool::new(false)),
            evaluations: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Held-out data used for the validation loss of each record.
    pub fn with_validation(mut self, data: Dataset) -> Self {
        self.validation = Some(data);
        self
    }

    /// Get cancellation handle.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    /// Current manager state.
    pub fn state(&self) -> &ManagerState {
        &self.state
    }

    /// Storage layout in use.
    pub fn layout(&self) -> &StorageLayout {
        &self.layout
    }

    /// Run generations up to `final_generation` (exclusive).
    pub fn run_generations(
        &mut self,
        final_generation: usize,
        train: &Dataset,
    ) -> Result<RunSummary, ControllerError> {
        self.run_with_callback(final_generation, train, |_| {})
    }

    /// Run generations with a progress callback.
    pub fn run_with_callback<F>(
        &mut self,
        final_generation: usize,
        train: &Dataset,
        callback: F,
    ) -> Result<RunSummary, ControllerError>
    where
        F: Fn(&EvolutionProgress),
    {
        let start_time = Instant::now();
        let start_generation = self.state.history.current_generation;
        let evaluations_before = self.evaluations.load(Ordering::Relaxed);

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.state.config.workers)
            .build()
            .map_err(|e| ControllerError::ThreadPool(e.to_string()))?;

        self.layout.ensure_root()?;

        let mut stop_reason = StopReason::Completed;
        for generation in start_generation..final_generation {
            if self.cancelled.load(Ordering::Relaxed) {
                stop_reason = StopReason::Cancelled;
                break;
            }

            info!("Generation {}/{}", generation, final_generation);
            self.layout.ensure_generation(generation)?;
            if generation == 0 {
                callback(&self.progress(
                    generation,
                    final_generation,
                    0,
                    EvolutionPhase::Initializing,
                    None,
                ));
            }
            self.prepare_population(generation)?;

            callback(&self.progress(
                generation,
                final_generation,
                0,
                EvolutionPhase::Evaluating,
                None,
            ));

            let cache = self.evaluate_generation(&pool, generation, train)?;
            if self.cancelled.load(Ordering::Relaxed) {
                info!("Cancelled during generation {}", generation);
                stop_reason = StopReason::Cancelled;
                break;
            }

            let population = self.state.config.population_size;
            let ranked = rank(cache.records_for(self.slot_ids().iter().map(String::as_str)));
            let Some(best) = ranked.first() else {
                error!("Generation {} has no evaluated models", generation);
                return Err(ControllerError::EmptyGeneration(generation));
            };
            let generation_best = best.accuracy;
            info!(
                "Generation {}: best {} at {:.4} ({} of {} models scored)",
                generation,
                best.model_name,
                best.accuracy,
                ranked.len(),
                population
            );

            self.record_snapshot(generation, &ranked);

            if generation + 1 < final_generation {
                callback(&self.progress(
                    generation,
                    final_generation,
                    ranked.len(),
                    EvolutionPhase::Reproducing,
                    Some(generation_best),
                ));
                self.reproduce(generation, &ranked, false)?;
            }

            self.checkpoint(generation + 1)?;
            callback(&self.progress(
                generation,
                final_generation,
                ranked.len(),
                EvolutionPhase::Checkpointed,
                Some(generation_best),
            ));
        }

        let next_generation = self.state.history.current_generation;
        let phase = match stop_reason {
            StopReason::Completed => EvolutionPhase::Complete,
            StopReason::Cancelled => EvolutionPhase::Stopped,
        };
        callback(&self.progress(next_generation, final_generation, 0, phase, None));

        let summary = RunSummary {
            start_generation,
            next_generation,
            generations_completed: next_generation.saturating_sub(start_generation),
            evaluations: self.evaluations.load(Ordering::Relaxed) - evaluations_before,
            best: self.state.history.best_overall().cloned(),
            elapsed_seconds: start_time.elapsed().as_secs_f64(),
            stop_reason,
        };
        info!(
            "Run stopped ({:?}) after {} generations and {} evaluations; next generation {}",
            summary.stop_reason,
            summary.generations_completed,
            summary.evaluations,
            summary.next_generation
        );
        Ok(summary)
    }

    fn slot_ids(&self) -> Vec<String> {
        (1..=self.state.config.population_size)
            .map(model_name)
            .collect()
    }

    fn missing_slots(&self, generation: usize) -> usize {
        self.slot_ids()
            .iter()
            .filter(|id| !self.layout.model_path(generation, id).exists())
            .count()
    }

    /// Make sure the namespace holds a population before evaluation.
    fn prepare_population(&self, generation: usize) -> Result<(), ControllerError> {
        if generation == 0 {
            self.create_initial_population();
            return Ok(());
        }
        let missing = self.missing_slots(generation);
        if missing == 0 {
            return Ok(());
        }

        // Either the previous run ended on its final generation without
        // reproducing, or it died while writing offspring.
        match self.state.history.history.last() {
            Some(snapshot) if snapshot.generation + 1 == generation => {
                let partial = missing < self.state.config.population_size;
                info!(
                    "Generation {} is missing {} models, repopulating from generation {}",
                    generation, missing, snapshot.generation
                );
                let survivors = snapshot.models.clone();
                self.reproduce(snapshot.generation, &survivors, partial)
            }
            _ => Ok(()),
        }
    }

    fn create_initial_population(&self) {
        let config = &self.state.config;
        let shape = config.network_shape();
        let mut rng = NetworkRng::for_generation(self.state.seed(), 0);
        let mut created = 0;

        for id in self.slot_ids() {
            let path = self.layout.model_path(0, &id);
            if path.exists() {
                debug!("Keeping existing {}", path.display());
                continue;
            }

            let mut network = self.capabilities.factory.create_random(
                &shape,
                &id,
                &config.project_name,
                &mut rng,
            );
            if config.cycle_all_mutations {
                self.capabilities.mutator.mutate(
                    &mut network,
                    config.mutation.learning_rate,
                    config.mutation.mutation_rate,
                    &mut rng,
                );
            }
            match save_model_config(&network, &path) {
                Ok(()) => created += 1,
                Err(e) => warn!("Initial model {} could not be saved: {}", id, e),
            }
        }
        info!("Initial population: {} models created", created);
    }

    /// Score every slot missing from the generation's cache.
    fn evaluate_generation(
        &self,
        pool: &rayon::ThreadPool,
        generation: usize,
        train: &Dataset,
    ) -> Result<EvaluationCache, ControllerError> {
        let namespace = self.layout.generation_dir(generation);
        let cache = EvaluationCache::load(&namespace)?;
        let pending: Vec<String> = self
            .slot_ids()
            .into_iter()
            .filter(|id| !cache.contains(id))
            .collect();

        info!(
            "Generation {}: {} cached, {} to evaluate",
            generation,
            cache.len(),
            pending.len()
        );
        if pending.is_empty() {
            return Ok(cache);
        }

        let shared = Mutex::new(SharedCache {
            cache,
            persist_error: None,
        });

        pool.install(|| {
            pending.par_iter().for_each(|id| {
                if self.cancelled.load(Ordering::Relaxed) {
                    return;
                }
                let Some(record) = self.evaluate_model(generation, id, train) else {
                    return;
                };

                let mut guard = lock(&shared);
                if !guard.cache.insert(record) {
                    return;
                }
                if let Err(e) = guard.cache.save() {
                    error!("Evaluation cache of generation {} not persisted: {}", generation, e);
                    if guard.persist_error.is_none() {
                        guard.persist_error = Some(e);
                    }
                }
            });
        });

        let shared = shared
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(source) = shared.persist_error {
            return Err(ControllerError::CachePersist { generation, source });
        }
        Ok(shared.cache)
    }

    fn evaluate_model(&self, generation: usize, id: &str, train: &Dataset) -> Option<ModelRecord> {
        let path = self.layout.model_path(generation, id);
        let config: C = match load_model_config(&path) {
            Ok(config) => config,
            Err(e) => {
                warn!("Skipping {}: {}", id, e);
                return None;
            }
        };
        if !config.is_consistent() {
            warn!("Skipping {}: inconsistent configuration", id);
            return None;
        }

        let evaluator = &self.capabilities.evaluator;
        let accuracy = evaluator.evaluate(&config, train);
        let training_loss = evaluator.loss(&config, train);
        let validation_loss = self
            .validation
            .as_ref()
            .and_then(|data| evaluator.loss(&config, data));
        self.evaluations.fetch_add(1, Ordering::Relaxed);

        debug!("Generation {} {}: accuracy {:.4}", generation, id, accuracy);
        Some(ModelRecord::new(id, accuracy).with_losses(training_loss, validation_loss))
    }

    fn record_snapshot(&mut self, generation: usize, ranked: &[ModelRecord]) {
        let retention = self.state.config.retention;
        self.state.history.record_generation(GenerationSnapshot {
            generation,
            models: top_k(ranked, retention),
        });

        if let Some(best) = ranked.first() {
            let path = self.layout.model_path(generation, &best.model_name);
            match load_model_config::<serde_json::Value>(&path) {
                Ok(value) => self.state.history.model_config = Some(value),
                Err(e) => warn!("Best configuration {} could not be read: {}", best.model_name, e),
            }
        }
    }

    /// Populate `generation + 1` from the ranked records of `generation`.
    ///
    /// With `keep_existing`, models already in the namespace and their cached
    /// scores stay; only the missing slots are written.
    fn reproduce(
        &self,
        generation: usize,
        ranked: &[ModelRecord],
        keep_existing: bool,
    ) -> Result<(), ControllerError> {
        let next = generation + 1;
        let namespace = self.layout.ensure_generation(next)?;
        if !keep_existing && EvaluationCache::discard(&namespace)? {
            info!("Discarded stale evaluation cache of generation {}", next);
        }

        let config = &self.state.config;
        let policy = SelectionPolicy {
            population: config.population_size,
            retention: config.retention,
            mutation: config.mutation,
        };
        let mut rng = NetworkRng::for_generation(self.state.seed(), next);
        let mutator = self.capabilities.mutator.as_ref();
        let report = if keep_existing {
            policy.fill_next_generation(ranked, &self.layout, generation, mutator, &mut rng)
        } else {
            policy.populate_next_generation(ranked, &self.layout, generation, mutator, &mut rng)
        };

        for (parent, count) in report.counts_by_parent() {
            debug!("Generation {}: {} offspring of {}", next, count, parent);
        }
        if !report.skipped.is_empty() || !report.failed.is_empty() {
            warn!(
                "Generation {} is short: slots {:?} skipped, {:?} not saved",
                next, report.skipped, report.failed
            );
        }
        Ok(())
    }

    /// Persist the project state with `next_generation` as the resume point.
    fn checkpoint(&mut self, next_generation: usize) -> Result<(), ControllerError> {
        let history = &mut self.state.history;
        history.current_generation = next_generation;

        if let Err(e) = save_project_state(history, &self.layout.state_path()) {
            error!("Project state not persisted: {}", e);
            return Err(e.into());
        }
        if let Err(e) = export_history(history, &self.layout.history_export_path()) {
            warn!("History export failed: {}", e);
        }
        debug!("Checkpointed at generation {}", next_generation);
        Ok(())
    }

    fn progress(
        &self,
        generation: usize,
        final_generation: usize,
        evaluations_completed: usize,
        phase: EvolutionPhase,
        generation_best: Option<f64>,
    ) -> EvolutionProgress {
        EvolutionProgress {
            generation,
            final_generation,
            evaluations_completed,
            evaluations_total: self.state.config.population_size,
            generation_best,
            best_fitness: self.state.history.best_overall().map(|r| r.accuracy),
            phase,
        }
    }
}
