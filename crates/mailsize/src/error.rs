//! Error types for the scan pipeline

use std::path::PathBuf;

use crate::models::{LabelId, MessageId};

/// Fatal errors that end a scan run
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("Failed to acquire Gmail credentials")]
    Credential(#[source] anyhow::Error),

    #[error("Remote service error during {operation}")]
    RemoteService {
        operation: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error(transparent)]
    UnknownLabel(#[from] UnknownLabelError),

    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),

    #[error("Failed to start fetch worker pool")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

impl ScanError {
    pub(crate) fn remote(operation: &'static str, source: anyhow::Error) -> Self {
        Self::RemoteService { operation, source }
    }
}

/// A single message could not be fetched; the rest of its batch is unaffected
#[derive(Debug, thiserror::Error)]
#[error("Failed to fetch message {item_id}")]
pub struct ItemFetchError {
    pub item_id: MessageId,
    #[source]
    pub cause: anyhow::Error,
}

/// A message references a label missing from the catalog
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Message {item_id} references label {label_id} which is not in the label catalog")]
pub struct UnknownLabelError {
    pub item_id: MessageId,
    pub label_id: LabelId,
}

/// Checkpoint persistence failures
#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    #[error("Failed to persist checkpoint at {}", path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Checkpoint at {} is corrupt: {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },
}

/// The scan was cancelled before a page could finish
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Scan interrupted")]
pub struct Interrupted;
