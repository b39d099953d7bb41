//! Per-generation evaluation cache.
//!
//! Maps model identifiers to their fitness records for one generation
//! namespace. A record, once inserted, is never replaced: this is what makes
//! re-running an interrupted generation skip models that were already scored.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::schema::ModelRecord;
use crate::storage::{EVALUATION_RESULTS_FILE, StorageError, read_json, write_json_atomic};

/// Evaluation results of one generation.
#[derive(Debug, Clone)]
pub struct EvaluationCache {
    /// Cache file inside the generation namespace.
    path: PathBuf,
    /// Records keyed by model identifier.
    records: BTreeMap<String, ModelRecord>,
}

impl EvaluationCache {
    /// Empty cache bound to a generation namespace.
    pub fn empty<P: AsRef<Path>>(namespace: P) -> Self {
        Self {
            path: namespace.as_ref().join(EVALUATION_RESULTS_FILE),
            records: BTreeMap::new(),
        }
    }

    /// Load the cache of a namespace. A missing file yields an empty cache.
    pub fn load<P: AsRef<Path>>(namespace: P) -> Result<Self, StorageError> {
        let mut cache = Self::empty(namespace);
        if let Some(records) = read_json::<BTreeMap<String, ModelRecord>>(&cache.path)? {
            cache.records = records;
        }
        Ok(cache)
    }

    /// Atomically write the full mapping.
    pub fn save(&self) -> Result<(), StorageError> {
        write_json_atomic(&self.path, &self.records)
    }

    /// Remove any persisted cache of a namespace.
    pub fn discard<P: AsRef<Path>>(namespace: P) -> Result<bool, StorageError> {
        let path = namespace.as_ref().join(EVALUATION_RESULTS_FILE);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(StorageError::Io { path, source }),
        }
    }

    /// Insert a record unless one already exists for its identifier.
    ///
    /// Returns `false` (and keeps the existing record) on a duplicate.
    pub fn insert(&mut self, record: ModelRecord) -> bool {
        if self.records.contains_key(&record.model_name) {
            return false;
        }
        self.records.insert(record.model_name.clone(), record);
        true
    }

    /// Get a record by identifier.
    pub fn get(&self, model_id: &str) -> Option<&ModelRecord> {
        self.records.get(model_id)
    }

    /// Check if a model has been scored.
    pub fn contains(&self, model_id: &str) -> bool {
        self.records.contains_key(model_id)
    }

    /// Records for the given identifiers, in the given order, skipping unscored ones.
    pub fn records_for<'a, I>(&self, model_ids: I) -> Vec<ModelRecord>
    where
        I: IntoIterator<Item = &'a str>,
    {
        model_ids
            .into_iter()
            .filter_map(|id| self.records.get(id).cloned())
            .collect()
    }

    /// Path of the cache file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of scored models.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if nothing has been scored.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
