//! Generational hill climbing over neural-network configurations.
//!
//! # Overview
//!
//! The search consists of:
//!
//! - **Evaluation Cache** (`cache`): per-generation scores, each model scored at most once
//! - **Fitness** (`fitness`): pluggable evaluators scoring a configuration on a dataset
//! - **Genome Operations** (`genome`): random creation and in-place mutation
//! - **Ranking** (`ranking`): stable best-first ordering of a generation
//! - **Selection** (`selection`): survivor apportionment and offspring creation
//! - **Controller** (`controller`): the resumable generation loop
//!
//! # Example
//!
//! ```rust,no_run
//! use netclimb::compute::evolution::{Capabilities, GenerationController, ManagerState};
//! use netclimb::schema::{DatasetProvider, ProjectConfig, SyntheticDataset};
//!
//! let config = ProjectConfig::default();
//! let data = SyntheticDataset::default().load().unwrap();
//!
//! let state = ManagerState::init(config).unwrap();
//! let mut controller = GenerationController::new(state, Capabilities::dense());
//! let summary = controller
//!     .run_with_callback(10, &data, |progress| {
//!         println!("Generation {}: {:?}", progress.generation, progress.phase);
//!     })
//!     .unwrap();
//!
//! println!("Next generation: {}", summary.next_generation);
//! ```

mod cache;
mod controller;
mod fitness;
mod genome;
mod ranking;
mod selection;

pub use cache::EvaluationCache;
pub use controller::{Capabilities, ControllerError, GenerationController, ManagerState};
pub use fitness::{AccuracyEvaluator, NetworkEvaluator};
pub use genome::{
    ConfigFactory, DenseFactory, GaussianMutator, Mutator, NetworkRng, offspring_of,
};
pub use ranking::{rank, top_k};
pub use selection::{Offspring, OffspringReport, SelectionPolicy, apportion, copy_counts};
