//! Pagination driver
//!
//! Walks the message listing page by page. Each page goes through the
//! bounded fetch scheduler, is folded into the aggregation state and
//! checkpointed before the next page is requested, so an interrupted run
//! loses at most the page in flight.

use log::{debug, info, warn};

use super::{BatchFetcher, CancelFlag, fetch_all_labels};
use crate::error::{Interrupted, ScanError};
use crate::gmail::MailboxService;
use crate::models::{AggregationState, PageTally, Termination};
use crate::report::stat_line;
use crate::storage::CheckpointStore;

/// Parameters of a scan run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanOptions {
    /// Message ids per listing page; only used for fresh scans
    pub page_size: u32,
    /// Messages fetched in parallel
    pub concurrency: usize,
}

/// How a call to [`Scanner::run`] ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOutcome {
    /// The restored state was already complete; nothing was fetched
    AlreadyComplete,
    /// Paging terminated and the final checkpoint was written
    Completed(Termination),
    /// Cancelled; the state equals the last checkpoint
    Interrupted,
}

enum PageStep {
    Continue,
    Done(Termination),
    Interrupted,
}

/// Restore the checkpointed state, or start a fresh one with `page_size`.
///
/// A restored state keeps its own page size; cursors are only valid for
/// the page size they were issued with.
pub fn load_or_create_state(
    store: &dyn CheckpointStore,
    page_size: u32,
) -> Result<AggregationState, ScanError> {
    match store.load()? {
        Some(state) => {
            info!("Loaded state from checkpoint: {}", stat_line(&state));
            if state.page_size != page_size {
                warn!(
                    "Ignoring requested page size {}, using {} from checkpoint",
                    page_size, state.page_size
                );
            }
            Ok(state)
        }
        None => {
            info!("No checkpoint found, starting a fresh scan");
            Ok(AggregationState::new(page_size))
        }
    }
}

/// Drives a resumable scan against a mailbox and a checkpoint store
pub struct Scanner<'a> {
    service: &'a dyn MailboxService,
    store: &'a dyn CheckpointStore,
    options: ScanOptions,
    cancel: CancelFlag,
}

impl<'a> Scanner<'a> {
    pub fn new(
        service: &'a dyn MailboxService,
        store: &'a dyn CheckpointStore,
        options: ScanOptions,
    ) -> Self {
        Self {
            service,
            store,
            options,
            cancel: CancelFlag::new(),
        }
    }

    /// Stop the scan cooperatively when `cancel` is set
    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Run the scan until the listing ends, the cursor stalls, or the
    /// cancel flag is set.
    pub fn run(&self, state: &mut AggregationState) -> Result<ScanOutcome, ScanError> {
        if state.completed {
            info!("Checkpoint is already complete");
            return Ok(ScanOutcome::AlreadyComplete);
        }

        if state.labels.is_empty() {
            state.install_labels(fetch_all_labels(self.service)?);
            self.save(state)?;
        } else {
            info!("Labels loaded from checkpoint");
        }

        let mut batch =
            BatchFetcher::new(self.service, self.options.concurrency, self.cancel.clone())?;

        loop {
            if self.cancel.is_cancelled() {
                info!("Scan interrupted before requesting the next page");
                return Ok(ScanOutcome::Interrupted);
            }

            match self.process_next_page(state, &mut batch)? {
                PageStep::Continue => {}
                PageStep::Done(termination) => {
                    state.mark_done(termination);
                    self.save(state)?;
                    return Ok(ScanOutcome::Completed(termination));
                }
                PageStep::Interrupted => {
                    info!("Scan interrupted, discarding the page in flight");
                    return Ok(ScanOutcome::Interrupted);
                }
            }
        }
    }

    fn process_next_page(
        &self,
        state: &mut AggregationState,
        batch: &mut BatchFetcher<'_>,
    ) -> Result<PageStep, ScanError> {
        let cursor = state.cursor.clone();
        let page = self
            .service
            .list_messages(state.page_size, cursor.as_deref())
            .map_err(|e| ScanError::remote("list messages", e))?;

        if page.ids.is_empty() {
            debug!("Empty page at cursor {:?}", cursor);
            return Ok(PageStep::Done(Termination::EndOfList));
        }

        // A page that hands back its own cursor would be served forever
        if cursor.is_some() && page.next_cursor == cursor {
            warn!(
                "Listing cursor {:?} did not advance; stopping with possibly incomplete totals",
                cursor
            );
            return Ok(PageStep::Done(Termination::CursorStalled));
        }

        let results = match batch.fetch_batch(&page.ids) {
            Ok(results) => results,
            Err(Interrupted) => return Ok(PageStep::Interrupted),
        };

        let mut tally = PageTally::new();
        for result in &results {
            match result {
                Ok(item) => tally.add(item),
                Err(_) => tally.add_failure(),
            }
        }
        if tally.failed() > 0 {
            warn!(
                "{} of {} messages on this page could not be fetched and are excluded",
                tally.failed(),
                page.ids.len()
            );
        }

        let at_end = page.next_cursor.is_none();
        state.apply_page(tally, page.ids.len() as u64, page.next_cursor)?;
        self.save(state)?;

        Ok(if at_end {
            PageStep::Done(Termination::EndOfList)
        } else {
            PageStep::Continue
        })
    }

    fn save(&self, state: &AggregationState) -> Result<(), ScanError> {
        self.store.save(state)?;
        info!("Checkpoint saved: {}", stat_line(state));
        Ok(())
    }
}
