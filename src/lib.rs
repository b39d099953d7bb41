//! netclimb - Resumable generational hill climbing over neural networks.
//!
//! A population of network configurations is scored, ranked, and replaced
//! by mutated copies of its best members, one generation at a time. Every
//! score and every generation boundary is persisted, so a run interrupted at
//! any point continues where it left off without re-scoring a model.
//!
//! # Architecture
//!
//! The crate is split into three main modules:
//!
//! - `schema`: Configuration, datasets, network and history types
//! - `compute`: Feed-forward evaluation and the evolutionary search
//! - `storage`: Atomic JSON persistence and the on-disk layout
//!
//! # Example
//!
//! ```rust,no_run
//! use netclimb::{
//!     compute::evolution::{Capabilities, GenerationController, ManagerState},
//!     schema::{DatasetProvider, ProjectConfig, SyntheticDataset},
//! };
//!
//! let config = ProjectConfig {
//!     generations: 20,
//!     ..Default::default()
//! };
//! let data = SyntheticDataset::default().load().unwrap().split(config.train_split);
//!
//! let final_generation = config.generations;
//! let state = ManagerState::init(config).unwrap();
//! let mut controller =
//!     GenerationController::new(state, Capabilities::dense()).with_validation(data.validation);
//! let summary = controller.run_generations(final_generation, &data.train).unwrap();
//!
//! if let Some(best) = summary.best {
//!     println!("Best: {} ({:.3})", best.model_name, best.accuracy);
//! }
//! ```

pub mod compute;
pub mod schema;
pub mod storage;

// Re-export commonly used types
pub use compute::evolution::{Capabilities, ControllerError, GenerationController, ManagerState};
pub use schema::{Dataset, ModelRecord, NetworkConfig, ProjectConfig, ProjectHistory};
