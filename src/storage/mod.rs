//! Storage module - Durable JSON persistence for generations and project state.

mod atomic;
mod layout;
mod state;

use std::path::PathBuf;

pub use atomic::*;
pub use layout::*;
pub use state::*;

/// Persistence errors. Every variant names the file involved.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Malformed JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
