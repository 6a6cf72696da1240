//! Bounded fetch scheduler
//!
//! Ids are processed in consecutive chunks of at most `pool_size`. All
//! fetches of a chunk run in parallel, each on its own fetcher, and the
//! next chunk starts only once the whole chunk has finished. Peak
//! concurrency is therefore exactly the pool size.

use log::warn;
use rayon::prelude::*;

use super::{CancelFlag, ItemFetcher};
use crate::error::{Interrupted, ItemFetchError, ScanError};
use crate::gmail::MailboxService;
use crate::models::{ItemMetadata, MessageId};

/// Outcome of each id of a batch, in input order
pub type BatchResults = Vec<Result<ItemMetadata, ItemFetchError>>;

/// Pool of fetchers driven in lock-step chunks
pub struct BatchFetcher<'a> {
    pool: rayon::ThreadPool,
    fetchers: Vec<ItemFetcher<'a>>,
    cancel: CancelFlag,
}

impl<'a> BatchFetcher<'a> {
    /// Create a pool of `pool_size` fetchers (at least one)
    pub fn new(
        service: &'a dyn MailboxService,
        pool_size: usize,
        cancel: CancelFlag,
    ) -> Result<Self, ScanError> {
        let pool_size = pool_size.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(pool_size)
            .thread_name(|i| format!("fetch-{}", i))
            .build()?;

        Ok(Self {
            pool,
            fetchers: (0..pool_size).map(|_| ItemFetcher::new(service)).collect(),
            cancel,
        })
    }

    pub fn pool_size(&self) -> usize {
        self.fetchers.len()
    }

    /// Fetch every id. Individual failures are returned in place and never
    /// abort the batch. Cancellation is checked before each chunk; a
    /// cancelled batch returns [`Interrupted`] and its results are dropped.
    pub fn fetch_batch(&mut self, ids: &[MessageId]) -> Result<BatchResults, Interrupted> {
        let Self {
            pool,
            fetchers,
            cancel,
        } = self;

        let mut results = Vec::with_capacity(ids.len());
        for chunk in ids.chunks(fetchers.len()) {
            if cancel.is_cancelled() {
                return Err(Interrupted);
            }

            let slots = &mut fetchers[..chunk.len()];
            let chunk_results: BatchResults = pool.install(|| {
                slots
                    .par_iter_mut()
                    .zip(chunk.par_iter())
                    .map(|(fetcher, id)| fetcher.fetch(id))
                    .collect()
            });

            for failure in chunk_results.iter().filter_map(|r| r.as_ref().err()) {
                warn!("{}: {:#}", failure, failure.cause);
            }
            results.extend(chunk_results);
        }

        Ok(results)
    }
}
