//! Gmail API response normalization
//!
//! Converts untyped-ish Gmail payloads into domain models, rejecting
//! payloads that lack fields the aggregation depends on.

use anyhow::{Context, Result};

use super::api::{GmailLabel, ListMessagesResponse, MinimalMessage};
use super::{LabelInfo, MessagePage};
use crate::models::{ItemMetadata, LabelCategory, LabelId, MessageId};

/// Normalize a listed label. Anything not explicitly "system" counts as a user label.
pub fn normalize_label(label: GmailLabel) -> LabelInfo {
    let category = match label.label_type.as_deref() {
        Some(t) if t.eq_ignore_ascii_case("system") => LabelCategory::System,
        _ => LabelCategory::User,
    };

    LabelInfo {
        id: LabelId::new(label.id),
        name: label.name,
        category,
    }
}

/// Normalize a `format=minimal` message.
///
/// `sizeEstimate` is required. A missing `labelIds` means the message
/// carries no labels.
pub fn normalize_message(message: MinimalMessage) -> Result<ItemMetadata> {
    let size_estimate = message
        .size_estimate
        .with_context(|| format!("Message {} has no sizeEstimate", message.id))?;

    Ok(ItemMetadata::new(
        MessageId::new(message.id),
        size_estimate,
        message.label_ids.unwrap_or_default(),
    ))
}

/// Normalize one page of the message listing
pub fn normalize_page(response: ListMessagesResponse) -> MessagePage {
    MessagePage {
        ids: response
            .messages
            .unwrap_or_default()
            .into_iter()
            .map(|m| MessageId::new(m.id))
            .collect(),
        next_cursor: response.next_page_token.filter(|t| !t.is_empty()),
    }
}
