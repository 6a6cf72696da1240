//! Label model representing a Gmail label and its running totals

use serde::{Deserialize, Serialize};

/// Unique identifier for a label (Gmail label ID)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LabelId(pub String);

impl LabelId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for LabelId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for LabelId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for LabelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Who owns a label: Gmail itself or the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelCategory {
    System,
    User,
}

/// A mail label with accumulated size and message count
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    /// Label ID (e.g., "INBOX", "Label_123")
    pub id: LabelId,
    /// Display name
    pub name: String,
    pub category: LabelCategory,
    /// Sum of size estimates of every message carrying this label, in bytes
    pub total_size: u64,
    /// Number of messages carrying this label
    pub message_count: u64,
}

impl Label {
    /// Create a user label with zeroed totals
    pub fn new(id: impl Into<LabelId>, name: impl Into<String>) -> Self {
        Self::with_category(id, name, LabelCategory::User)
    }

    /// Create a system label with zeroed totals
    pub fn system(id: impl Into<LabelId>, name: impl Into<String>) -> Self {
        Self::with_category(id, name, LabelCategory::System)
    }

    pub fn with_category(
        id: impl Into<LabelId>,
        name: impl Into<String>,
        category: LabelCategory,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            category,
            total_size: 0,
            message_count: 0,
        }
    }

    pub fn is_system(&self) -> bool {
        self.category == LabelCategory::System
    }

    /// Whether the label belongs in the printed summary
    pub fn is_relevant(&self) -> bool {
        self.message_count > 0 && !self.is_system()
    }

    /// Add one message's contribution
    pub fn add(&mut self, size: u64, count: u64) {
        self.total_size += size;
        self.message_count += count;
    }
}
