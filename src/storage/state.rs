//! Project-state and model-configuration persistence.

use std::fs;
use std::path::{Path, PathBuf};

use log::info;
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::{StorageError, read_json, write_json_atomic};
use crate::schema::ProjectHistory;

/// Load a model configuration. A missing file is an error here.
pub fn load_model_config<C: DeserializeOwned>(path: &Path) -> Result<C, StorageError> {
    read_json(path)?.ok_or_else(|| StorageError::Io {
        path: path.to_path_buf(),
        source: std::io::ErrorKind::NotFound.into(),
    })
}

/// Atomically persist a model configuration.
pub fn save_model_config<C: Serialize>(config: &C, path: &Path) -> Result<(), StorageError> {
    write_json_atomic(path, config)
}

/// Load a saved project history.
///
/// Returns `Ok(None)` when no file exists at `path`.
pub fn load_project_state(path: &Path) -> Result<Option<ProjectHistory>, StorageError> {
    let history = read_json::<ProjectHistory>(path)?;
    if let Some(h) = &history {
        info!(
            "Loaded project '{}' from {} (next generation {})",
            h.project_name,
            path.display(),
            h.current_generation
        );
    }
    Ok(history)
}

/// Atomically persist the project history.
pub fn save_project_state(state: &ProjectHistory, path: &Path) -> Result<(), StorageError> {
    write_json_atomic(path, state)
}

/// Write the history-only export.
pub fn export_history(state: &ProjectHistory, path: &Path) -> Result<(), StorageError> {
    write_json_atomic(path, &state.export())
}

/// Copy an unreadable save file aside as `<path>.corrupt`, returning the copy.
pub fn backup_corrupt_state(path: &Path) -> Result<PathBuf, StorageError> {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".corrupt");
    let backup = path.with_file_name(name);

    fs::copy(path, &backup).map_err(|source| StorageError::Io {
        path: backup.clone(),
        source,
    })?;
    Ok(backup)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{GenerationSnapshot, ModelRecord};
    use tempfile::tempdir;

    fn sample_history() -> ProjectHistory {
        let mut history = ProjectHistory::new("proj", 10, true);
        history.record_generation(GenerationSnapshot {
            generation: 0,
            models: vec![ModelRecord::new("model-4", 0.6), ModelRecord::new("model-1", 0.5)],
        });
        history.current_generation = 1;
        history.random_seed = Some(5);
        history.model_config = Some(serde_json::json!({ "metadata": { "model_id": "model-4" } }));
        history
    }

    #[test]
    fn test_missing_model_config_is_error() {
        let dir = tempdir().unwrap();
        let result: Result<serde_json::Value, _> =
            load_model_config(&dir.path().join("model-1.json"));
        assert!(matches!(result, Err(StorageError::Io { .. })));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("proj_save_state.json");
        let history = sample_history();

        save_project_state(&history, &path).unwrap();
        let loaded = load_project_state(&path).unwrap().unwrap();
        assert_eq!(loaded, history);
    }

    #[test]
    fn test_absent_state() {
        let dir = tempdir().unwrap();
        let loaded = load_project_state(&dir.path().join("missing.json")).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_export_omits_model_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("proj_project_history.json");
        export_history(&sample_history(), &path).unwrap();

        let raw: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["total_generations"], 1);
        assert!(raw.get("model_config").is_none());
        assert_eq!(raw["history"][0]["models"][0]["model_name"], "model-4");
    }

    #[test]
    fn test_backup_corrupt_state() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("proj_save_state.json");
        fs::write(&path, "{ truncated").unwrap();

        let backup = backup_corrupt_state(&path).unwrap();
        assert_eq!(backup, dir.path().join("proj_save_state.json.corrupt"));
        assert_eq!(fs::read_to_string(backup).unwrap(), "{ truncated");
    }
}
