//! Item fetcher: one worker slot of the fetch pool

use log::debug;

use crate::error::ItemFetchError;
use crate::gmail::{MailboxService, MessageHandle};
use crate::models::{ItemMetadata, MessageId};

/// Fetches message metadata through a handle it owns exclusively.
///
/// The handle is opened on first use and kept for the fetcher's lifetime.
/// `fetch` takes `&mut self`, so one fetcher serves one call at a time;
/// concurrency comes from holding several fetchers.
pub struct ItemFetcher<'a> {
    service: &'a dyn MailboxService,
    handle: Option<Box<dyn MessageHandle>>,
}

impl<'a> ItemFetcher<'a> {
    pub fn new(service: &'a dyn MailboxService) -> Self {
        Self {
            service,
            handle: None,
        }
    }

    pub fn fetch(&mut self, id: &MessageId) -> Result<ItemMetadata, ItemFetchError> {
        let fetch_error = |cause: anyhow::Error| ItemFetchError {
            item_id: id.clone(),
            cause,
        };

        let handle = match self.handle.take() {
            Some(handle) => handle,
            None => {
                debug!("Opening message handle");
                // A failed open is retried by the next call
                self.service.open_handle().map_err(fetch_error)?
            }
        };

        self.handle.insert(handle).get_message(id).map_err(fetch_error)
    }

    /// Whether the handle has been opened yet
    pub fn is_connected(&self) -> bool {
        self.handle.is_some()
    }
}
