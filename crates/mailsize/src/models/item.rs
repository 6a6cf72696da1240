//! Per-message metadata fetched during a scan

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::LabelId;

/// Unique identifier for a message (Gmail message ID)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for MessageId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for MessageId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Size and labels of a single message.
///
/// Transient: folded into the aggregation state as soon as its page
/// completes and never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemMetadata {
    pub id: MessageId,
    /// Gmail's estimate of the message size in bytes
    pub size_estimate: u64,
    pub label_ids: BTreeSet<LabelId>,
}

impl ItemMetadata {
    pub fn new<I, L>(id: impl Into<MessageId>, size_estimate: u64, label_ids: I) -> Self
    where
        I: IntoIterator<Item = L>,
        L: Into<LabelId>,
    {
        Self {
            id: id.into(),
            size_estimate,
            label_ids: label_ids.into_iter().map(Into::into).collect(),
        }
    }
}
