//! On-disk layout of a project.
//!
//! ```text
//! <root>/<generation>/model-<i>.json
//! <root>/<generation>/evaluation_results.json
//! <root>/<project>_save_state.json
//! <root>/<project>_project_history.json
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use super::StorageError;

/// File name of a generation's evaluation cache.
pub const EVALUATION_RESULTS_FILE: &str = "evaluation_results.json";

/// Model identifier for a 1-based population slot.
pub fn model_name(slot: usize) -> String {
    format!("model-{slot}")
}

/// Path resolver for one project's storage root.
#[derive(Debug, Clone)]
pub struct StorageLayout {
    root: PathBuf,
    project_name: String,
}

impl StorageLayout {
    pub fn new<P: AsRef<Path>>(root: P, project_name: impl Into<String>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            project_name: project_name.into(),
        }
    }

    /// Namespace directory for a generation.
    pub fn generation_dir(&self, generation: usize) -> PathBuf {
        self.root.join(generation.to_string())
    }

    /// Path of a model configuration inside a generation namespace.
    pub fn model_path(&self, generation: usize, model_id: &str) -> PathBuf {
        self.generation_dir(generation)
            .join(format!("{model_id}.json"))
    }

    /// Path of a generation's evaluation cache.
    pub fn evaluation_results_path(&self, generation: usize) -> PathBuf {
        self.generation_dir(generation).join(EVALUATION_RESULTS_FILE)
    }

    /// Resumable project state.
    pub fn state_path(&self) -> PathBuf {
        self.root
            .join(format!("{}_save_state.json", self.project_name))
    }

    /// History-only export.
    pub fn history_export_path(&self) -> PathBuf {
        self.root
            .join(format!("{}_project_history.json", self.project_name))
    }

    /// Create the storage root if missing.
    pub fn ensure_root(&self) -> Result<(), StorageError> {
        create_dir(&self.root)
    }

    /// Create a generation namespace if missing, returning its path.
    pub fn ensure_generation(&self, generation: usize) -> Result<PathBuf, StorageError> {
        let dir = self.generation_dir(generation);
        create_dir(&dir)?;
        Ok(dir)
    }
}

fn create_dir(path: &Path) -> Result<(), StorageError> {
    fs::create_dir_all(path).map_err(|source| StorageError::CreateDir {
        path: path.to_path_buf(),
        source,
    })
}
