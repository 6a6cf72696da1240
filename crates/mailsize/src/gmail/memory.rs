//! In-memory mailbox implementation
//!
//! Test double for the remote mailbox. Pages are keyed by the cursor that
//! requests them, and every call is counted so tests can assert exactly
//! what a scan fetched.

use anyhow::Result;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::{LabelInfo, MailboxService, MessageHandle, MessagePage};
use crate::models::{ItemMetadata, LabelCategory, LabelId, MessageId};

/// Timing of one completed `get_message` call, in global event order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRecord {
    pub id: MessageId,
    pub started: u64,
    pub finished: u64,
}

/// Call counters and fetch timing shared by the mailbox and its handles
#[derive(Default)]
struct Counters {
    label_calls: AtomicUsize,
    page_calls: AtomicUsize,
    handles_opened: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    clock: AtomicU64,
    fetch_log: Mutex<Vec<FetchRecord>>,
    failing_cursors: Mutex<HashSet<Option<String>>>,
}

/// Mailbox served from memory
#[derive(Clone, Default)]
pub struct InMemoryMailbox {
    labels: Vec<LabelInfo>,
    pages: HashMap<Option<String>, MessagePage>,
    messages: Arc<HashMap<MessageId, ItemMetadata>>,
    failing_messages: Arc<HashSet<MessageId>>,
    fetch_delay: Duration,
    counters: Arc<Counters>,
}

impl InMemoryMailbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a label to the catalog
    pub fn with_label(mut self, id: &str, name: &str, category: LabelCategory) -> Self {
        self.labels.push(LabelInfo {
            id: LabelId::new(id),
            name: name.to_string(),
            category,
        });
        self
    }

    /// Add a page served for `cursor` that points at `next_cursor`
    pub fn with_page(
        mut self,
        cursor: Option<&str>,
        items: Vec<ItemMetadata>,
        next_cursor: Option<&str>,
    ) -> Self {
        let ids = items.iter().map(|i| i.id.clone()).collect();
        let messages = Arc::make_mut(&mut self.messages);
        for item in items {
            messages.insert(item.id.clone(), item);
        }
        self.pages.insert(
            cursor.map(String::from),
            MessagePage {
                ids,
                next_cursor: next_cursor.map(String::from),
            },
        );
        self
    }

    /// Add a chain of pages: the first is served without a cursor, page
    /// `n` is served for cursor `"page-n"`, and the last has no next cursor.
    pub fn with_pages(mut self, pages: Vec<Vec<ItemMetadata>>) -> Self {
        let count = pages.len();
        for (index, items) in pages.into_iter().enumerate() {
            let cursor = (index > 0).then(|| format!("page-{}", index));
            let next = (index + 1 < count).then(|| format!("page-{}", index + 1));
            self = self.with_page(cursor.as_deref(), items, next.as_deref());
        }
        self
    }

    /// Make every fetch of this message fail
    pub fn with_failing_message(mut self, id: &str) -> Self {
        Arc::make_mut(&mut self.failing_messages).insert(MessageId::new(id));
        self
    }

    /// Sleep this long inside every message fetch
    pub fn with_fetch_delay(mut self, delay: Duration) -> Self {
        self.fetch_delay = delay;
        self
    }

    /// Make listing the page for `cursor` fail until [`Self::heal_listing`]
    pub fn fail_listing_at(&self, cursor: Option<&str>) {
        if let Ok(mut failing) = self.counters.failing_cursors.lock() {
            failing.insert(cursor.map(String::from));
        }
    }

    /// Let every page listing succeed again
    pub fn heal_listing(&self) {
        if let Ok(mut failing) = self.counters.failing_cursors.lock() {
            failing.clear();
        }
    }

    pub fn label_calls(&self) -> usize {
        self.counters.label_calls.load(Ordering::SeqCst)
    }

    pub fn page_calls(&self) -> usize {
        self.counters.page_calls.load(Ordering::SeqCst)
    }

    pub fn handles_opened(&self) -> usize {
        self.counters.handles_opened.load(Ordering::SeqCst)
    }

    /// Highest number of fetches observed running at the same time
    pub fn peak_in_flight(&self) -> usize {
        self.counters.peak_in_flight.load(Ordering::SeqCst)
    }

    /// Completed fetches (successful or not) in completion order
    pub fn fetch_log(&self) -> Vec<FetchRecord> {
        self.counters
            .fetch_log
            .lock()
            .map(|log| log.clone())
            .unwrap_or_default()
    }

    /// Ids of every fetch attempt, in completion order
    pub fn fetched_ids(&self) -> Vec<MessageId> {
        self.fetch_log().into_iter().map(|r| r.id).collect()
    }
}

impl MailboxService for InMemoryMailbox {
    fn list_labels(&self) -> Result<Vec<LabelInfo>> {
        self.counters.label_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.labels.clone())
    }

    fn list_messages(&self, _page_size: u32, cursor: Option<&str>) -> Result<MessagePage> {
        self.counters.page_calls.fetch_add(1, Ordering::SeqCst);

        let key = cursor.map(String::from);
        let failing = self
            .counters
            .failing_cursors
            .lock()
            .map(|f| f.contains(&key))
            .unwrap_or(false);
        if failing {
            anyhow::bail!("listing unavailable for cursor {:?}", cursor);
        }

        // Cursors the mailbox never issued behave like the end of the list
        Ok(self.pages.get(&key).cloned().unwrap_or_default())
    }

    fn open_handle(&self) -> Result<Box<dyn MessageHandle>> {
        self.counters.handles_opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(InMemoryHandle {
            messages: Arc::clone(&self.messages),
            failing_messages: Arc::clone(&self.failing_messages),
            fetch_delay: self.fetch_delay,
            counters: Arc::clone(&self.counters),
        }))
    }
}

struct InMemoryHandle {
    messages: Arc<HashMap<MessageId, ItemMetadata>>,
    failing_messages: Arc<HashSet<MessageId>>,
    fetch_delay: Duration,
    counters: Arc<Counters>,
}

impl MessageHandle for InMemoryHandle {
    fn get_message(&mut self, id: &MessageId) -> Result<ItemMetadata> {
        let counters = &self.counters;
        let started = counters.clock.fetch_add(1, Ordering::SeqCst);
        let running = counters.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        counters.peak_in_flight.fetch_max(running, Ordering::SeqCst);

        if !self.fetch_delay.is_zero() {
            std::thread::sleep(self.fetch_delay);
        }

        let result = if self.failing_messages.contains(id) {
            Err(anyhow::anyhow!("simulated failure fetching {}", id))
        } else {
            self.messages
                .get(id)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("message {} not found", id))
        };

        counters.in_flight.fetch_sub(1, Ordering::SeqCst);
        let finished = counters.clock.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut log) = counters.fetch_log.lock() {
            log.push(FetchRecord {
                id: id.clone(),
                started,
                finished,
            });
        }
        result
    }
}
