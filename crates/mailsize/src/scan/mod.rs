//! Resumable label-size scan
//!
//! The driver walks the paged message listing, fans each page out to a
//! bounded pool of fetchers, folds the results into the aggregation state
//! and checkpoints after every page.

mod batch;
mod catalog;
mod driver;
mod fetcher;

pub use batch::{BatchFetcher, BatchResults};
pub use catalog::fetch_all_labels;
pub use driver::{ScanOptions, ScanOutcome, Scanner, load_or_create_state};
pub use fetcher::ItemFetcher;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared cancellation flag, set from a signal handler and polled by the scan
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
