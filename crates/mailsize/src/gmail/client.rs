//! Gmail API HTTP client
//!
//! Implements [`MailboxService`] over the Gmail REST API.
//! Uses synchronous HTTP (ureq) to be executor-agnostic.

use anyhow::{Context, Result};
use log::debug;
use std::sync::Arc;
use std::time::Duration;

use super::api::{ListLabelsResponse, ListMessagesResponse, MinimalMessage};
use super::normalize::{normalize_label, normalize_message, normalize_page};
use super::{CredentialProvider, LabelInfo, MailboxService, MessageHandle, MessagePage};
use crate::models::{ItemMetadata, MessageId};

/// Gmail API base URL
const BASE_URL: &str = "https://gmail.googleapis.com/gmail/v1";

/// Gmail caps `maxResults` for message listings at 500
const MAX_PAGE_SIZE: u32 = 500;

/// Attempts per message before giving up on it
const MESSAGE_FETCH_ATTEMPTS: u32 = 3;

fn build_agent(timeout: Duration) -> ureq::Agent {
    let config = ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .build();
    config.into()
}

/// Authenticated GET returning parsed JSON
fn get_json<T: serde::de::DeserializeOwned>(
    agent: &ureq::Agent,
    auth: &dyn CredentialProvider,
    url: &str,
    what: &str,
) -> Result<T> {
    let credential = auth.acquire()?;

    let mut response = agent
        .get(url)
        .header("Authorization", &format!("Bearer {}", credential.access_token))
        .call()
        .with_context(|| format!("Failed to send {} request", what))?;

    response
        .body_mut()
        .read_json()
        .with_context(|| format!("Failed to parse {} response", what))
}

/// Gmail API client for label and message listings
pub struct GmailClient {
    auth: Arc<dyn CredentialProvider>,
    agent: ureq::Agent,
    timeout: Duration,
}

impl GmailClient {
    /// Create a new Gmail client
    ///
    /// # Arguments
    /// * `auth` - Credential provider shared with every message handle
    /// * `timeout` - Global timeout applied to each request
    pub fn new(auth: Arc<dyn CredentialProvider>, timeout: Duration) -> Self {
        Self {
            auth,
            agent: build_agent(timeout),
            timeout,
        }
    }
}

impl MailboxService for GmailClient {
    fn list_labels(&self) -> Result<Vec<LabelInfo>> {
        let url = format!("{}/users/me/labels", BASE_URL);
        let response: ListLabelsResponse =
            get_json(&self.agent, self.auth.as_ref(), &url, "list labels")?;

        Ok(response
            .labels
            .unwrap_or_default()
            .into_iter()
            .map(normalize_label)
            .collect())
    }

    fn list_messages(&self, page_size: u32, cursor: Option<&str>) -> Result<MessagePage> {
        let mut params = vec![
            ("maxResults", page_size.clamp(1, MAX_PAGE_SIZE).to_string()),
            ("includeSpamTrash", "false".to_string()),
        ];
        if let Some(token) = cursor {
            params.push(("pageToken", token.to_string()));
        }
        let url = url::Url::parse_with_params(&format!("{}/users/me/messages", BASE_URL), &params)?;

        let response: ListMessagesResponse =
            get_json(&self.agent, self.auth.as_ref(), url.as_str(), "list messages")?;
        Ok(normalize_page(response))
    }

    fn open_handle(&self) -> Result<Box<dyn MessageHandle>> {
        Ok(Box::new(GmailMessageHandle {
            auth: Arc::clone(&self.auth),
            agent: build_agent(self.timeout),
            max_attempts: MESSAGE_FETCH_ATTEMPTS,
        }))
    }
}

/// Per-worker message fetcher with its own connection pool
pub struct GmailMessageHandle {
    auth: Arc<dyn CredentialProvider>,
    agent: ureq::Agent,
    max_attempts: u32,
}

impl GmailMessageHandle {
    fn get_message_once(&self, id: &MessageId) -> Result<ItemMetadata> {
        let url = format!(
            "{}/users/me/messages/{}?format=minimal",
            BASE_URL,
            urlencoding::encode(id.as_str())
        );
        let message: MinimalMessage =
            get_json(&self.agent, self.auth.as_ref(), &url, "get message")?;
        normalize_message(message)
    }
}

impl MessageHandle for GmailMessageHandle {
    /// Get a message with exponential backoff retry
    fn get_message(&mut self, id: &MessageId) -> Result<ItemMetadata> {
        let mut delay = Duration::from_millis(100);
        let mut attempt = 1;

        loop {
            match self.get_message_once(id) {
                Ok(item) => return Ok(item),
                Err(e) if attempt < self.max_attempts => {
                    debug!("Fetching message {} failed (attempt {}): {:#}", id, attempt, e);
                    std::thread::sleep(delay + Duration::from_millis(rand_jitter()));
                    delay *= 2;
                    attempt += 1;
                }
                Err(e) => {
                    return Err(e.context(format!("Giving up after {} attempts", attempt)));
                }
            }
        }
    }
}

/// Generate a random jitter value (0-100ms)
fn rand_jitter() -> u64 {
    use std::collections::hash_map::RandomState;
    use std::hash::{BuildHasher, Hasher};

    let hasher = RandomState::new().build_hasher();
    hasher.finish() % 100
}
