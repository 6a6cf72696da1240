//! In-memory checkpoint storage
//!
//! Keeps the serialized snapshot bytes rather than a clone of the state so
//! it exercises the same encoding as the file store.

use std::io;
use std::path::Path;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use super::format::{decode, encode};
use super::CheckpointStore;
use crate::error::CheckpointError;
use crate::models::AggregationState;

const MEMORY_PATH: &str = "<memory>";

/// In-memory implementation of CheckpointStore
#[derive(Default)]
pub struct InMemoryCheckpointStore {
    snapshot: RwLock<Option<Vec<u8>>>,
    saves: AtomicUsize,
    fail_saves: AtomicBool,
}

impl InMemoryCheckpointStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful saves so far
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// Make subsequent saves fail with a persistence error
    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    fn error(source: io::Error) -> CheckpointError {
        CheckpointError::Persistence {
            path: MEMORY_PATH.into(),
            source,
        }
    }
}

impl CheckpointStore for InMemoryCheckpointStore {
    fn load(&self) -> Result<Option<AggregationState>, CheckpointError> {
        let snapshot = self
            .snapshot
            .read()
            .map_err(|_| Self::error(io::Error::other("snapshot lock poisoned")))?;

        snapshot
            .as_deref()
            .map(|bytes| decode(bytes, Path::new(MEMORY_PATH)).map(|(state, _)| state))
            .transpose()
    }

    fn save(&self, state: &AggregationState) -> Result<(), CheckpointError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(Self::error(io::Error::other("simulated write failure")));
        }

        let bytes = encode(state).map_err(|e| Self::error(e.into()))?;
        let mut snapshot = self
            .snapshot
            .write()
            .map_err(|_| Self::error(io::Error::other("snapshot lock poisoned")))?;
        *snapshot = Some(bytes);
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
