//! Crash-tolerant JSON file writes.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;

use super::StorageError;

/// Temporary sibling file that replaces its target on commit.
///
/// The temporary lives in the same directory as the target so the final
/// rename never crosses a filesystem. Dropping without committing removes it.
struct AtomicFile {
    writer: BufWriter<File>,
    temp_path: PathBuf,
    final_path: PathBuf,
    committed: bool,
}

impl AtomicFile {
    fn create(final_path: &Path) -> io::Result<Self> {
        let mut name = final_path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        let temp_path = final_path.with_file_name(name);

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&temp_path)?;

        Ok(Self {
            writer: BufWriter::new(file),
            temp_path,
            final_path: final_path.to_path_buf(),
            committed: false,
        })
    }

    fn commit(&mut self) -> io::Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;
        fs::rename(&self.temp_path, &self.final_path)?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for AtomicFile {
    fn drop(&mut self) {
        if !self.committed {
            let _ = fs::remove_file(&self.temp_path);
        }
    }
}

/// Serialize `value` as pretty JSON and atomically replace `path` with it.
///
/// Readers observe either the previous file or the complete new one.
pub fn write_json_atomic<T: Serialize + ?Sized>(
    path: &Path,
    value: &T,
) -> Result<(), StorageError> {
    let io_err = |source: io::Error| StorageError::Io {
        path: path.to_path_buf(),
        source,
    };

    let mut file = AtomicFile::create(path).map_err(io_err)?;
    serde_json::to_writer_pretty(&mut file.writer, value).map_err(|source| {
        StorageError::Json {
            path: path.to_path_buf(),
            source,
        }
    })?;
    file.writer.write_all(b"\n").map_err(io_err)?;
    file.commit().map_err(io_err)
}

/// Read and parse a JSON file. Returns `Ok(None)` when the file does not exist.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StorageError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(StorageError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    serde_json::from_str(&content)
        .map(Some)
        .map_err(|source| StorageError::Json {
            path: path.to_path_buf(),
            source,
        })
}
