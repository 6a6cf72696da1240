//! File-based checkpoint storage with atomic replacement

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use log::debug;
use tempfile::NamedTempFile;

use super::format::{decode, encode};
use super::CheckpointStore;
use crate::error::CheckpointError;
use crate::models::AggregationState;

/// Checkpoint stored as a single JSON file.
///
/// Saves go to a temporary file in the same directory which is flushed to
/// disk and then renamed over the target, so a crash mid-write leaves the
/// previous checkpoint intact. The temporary file is removed when the save
/// fails at any step.
pub struct FileCheckpointStore {
    path: PathBuf,
}

impl FileCheckpointStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persistence_error(&self, source: std::io::Error) -> CheckpointError {
        CheckpointError::Persistence {
            path: self.path.clone(),
            source,
        }
    }

    /// Directory the temporary file is created in (same filesystem as the target)
    fn parent_dir(&self) -> &Path {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }
}

impl CheckpointStore for FileCheckpointStore {
    fn load(&self) -> Result<Option<AggregationState>, CheckpointError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.persistence_error(e)),
        };

        let (state, saved_at) = decode(&bytes, &self.path)?;
        debug!("Loaded checkpoint {} saved at {}", self.path.display(), saved_at);
        Ok(Some(state))
    }

    fn save(&self, state: &AggregationState) -> Result<(), CheckpointError> {
        let bytes = encode(state).map_err(|e| self.persistence_error(e.into()))?;

        let dir = self.parent_dir();
        fs::create_dir_all(dir).map_err(|e| self.persistence_error(e))?;

        let mut temp = NamedTempFile::new_in(dir).map_err(|e| self.persistence_error(e))?;
        temp.write_all(&bytes)
            .and_then(|_| temp.as_file().sync_all())
            .map_err(|e| self.persistence_error(e))?;
        temp.persist(&self.path)
            .map_err(|e| self.persistence_error(e.error))?;

        Ok(())
    }
}
