//! On-disk checkpoint envelope

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::CheckpointError;
use crate::models::AggregationState;

/// Current checkpoint format version
pub const CHECKPOINT_VERSION: u32 = 1;

#[derive(Serialize)]
struct EnvelopeRef<'a> {
    version: u32,
    saved_at: DateTime<Utc>,
    state: &'a AggregationState,
}

#[derive(Deserialize)]
struct Envelope {
    version: u32,
    saved_at: DateTime<Utc>,
    state: AggregationState,
}

pub(crate) fn encode(state: &AggregationState) -> serde_json::Result<Vec<u8>> {
    serde_json::to_vec_pretty(&EnvelopeRef {
        version: CHECKPOINT_VERSION,
        saved_at: Utc::now(),
        state,
    })
}

/// Decode a snapshot, returning the state and when it was saved
pub(crate) fn decode(
    bytes: &[u8],
    path: &Path,
) -> Result<(AggregationState, DateTime<Utc>), CheckpointError> {
    let corrupt = |reason: String| CheckpointError::Corrupt {
        path: path.to_path_buf(),
        reason,
    };

    let envelope: Envelope = serde_json::from_slice(bytes).map_err(|e| corrupt(e.to_string()))?;
    if envelope.version != CHECKPOINT_VERSION {
        return Err(corrupt(format!(
            "unsupported checkpoint version {}",
            envelope.version
        )));
    }
    Ok((envelope.state, envelope.saved_at))
}
