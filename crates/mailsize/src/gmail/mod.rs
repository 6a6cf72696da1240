//! Gmail API integration
//!
//! This module provides:
//! - The service traits the scan pipeline is written against
//! - OAuth2 credential provider
//! - Gmail REST client implementing the service traits
//! - In-memory mailbox for tests
//! - Response normalization to domain models

mod auth;
mod client;
mod memory;
mod normalize;

use anyhow::Result;

use crate::models::{ItemMetadata, LabelCategory, LabelId, MessageId};

pub use auth::{Credential, CredentialProvider, GmailAuth};
pub use client::{GmailClient, GmailMessageHandle};
pub use memory::{FetchRecord, InMemoryMailbox};
pub use normalize::{normalize_label, normalize_message, normalize_page};

/// Static metadata of a label as listed by the remote service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelInfo {
    pub id: LabelId,
    pub name: String,
    pub category: LabelCategory,
}

/// One page of the message listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessagePage {
    pub ids: Vec<MessageId>,
    /// Opaque cursor for the following page; None on the last page
    pub next_cursor: Option<String>,
}

/// Remote mailbox: label listing, paged message listing and per-message handles
pub trait MailboxService: Send + Sync {
    /// List every label of the mailbox
    fn list_labels(&self) -> Result<Vec<LabelInfo>>;

    /// List one page of message ids. `cursor` None requests the first page.
    fn list_messages(&self, page_size: u32, cursor: Option<&str>) -> Result<MessagePage>;

    /// Open a connection-owning handle for fetching message metadata.
    ///
    /// Each fetch worker opens its own handle and never shares it.
    fn open_handle(&self) -> Result<Box<dyn MessageHandle>>;
}

/// Exclusive, single-caller handle for fetching message metadata
pub trait MessageHandle: Send {
    fn get_message(&mut self, id: &MessageId) -> Result<ItemMetadata>;
}

/// Gmail API response types
pub mod api {
    use serde::Deserialize;

    /// Response from listing messages
    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ListMessagesResponse {
        pub messages: Option<Vec<MessageRef>>,
        pub next_page_token: Option<String>,
    }

    /// Reference to a message in a listing
    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct MessageRef {
        pub id: String,
    }

    /// Message fetched with `format=minimal`
    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct MinimalMessage {
        pub id: String,
        pub label_ids: Option<Vec<String>>,
        pub size_estimate: Option<u64>,
    }

    /// Response from listing labels
    #[derive(Debug, Deserialize)]
    pub struct ListLabelsResponse {
        pub labels: Option<Vec<GmailLabel>>,
    }

    /// Label as returned by the labels endpoint
    #[derive(Debug, Deserialize)]
    pub struct GmailLabel {
        pub id: String,
        pub name: String,
        /// "system" or "user"
        #[serde(rename = "type")]
        pub label_type: Option<String>,
    }
}
