//! Storage trait definitions

use crate::error::CheckpointError;
use crate::models::AggregationState;

/// Durable snapshots of the aggregation state
pub trait CheckpointStore: Send + Sync {
    /// Load the last saved snapshot, or None if nothing was saved yet
    fn load(&self) -> Result<Option<AggregationState>, CheckpointError>;

    /// Replace the saved snapshot. A concurrent reader sees either the old
    /// or the new snapshot, never a partial one.
    fn save(&self, state: &AggregationState) -> Result<(), CheckpointError>;
}
