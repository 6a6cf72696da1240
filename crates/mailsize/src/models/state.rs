//! Aggregation state: the unit of checkpointing for a scan
//!
//! The state is owned by the pagination driver for the whole run. Folding
//! happens in two steps: successful items of a page are collected into a
//! [`PageTally`], then the tally is validated and applied in one go so a
//! page either contributes completely or not at all.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{ItemMetadata, Label, LabelId, MessageId};
use crate::error::UnknownLabelError;

/// Why a scan stopped paging
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// The listing returned an empty page or no further cursor
    EndOfList,
    /// The listing handed back the cursor it was called with. Totals may
    /// be incomplete.
    CursorStalled,
}

/// Progress of a label-size scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregationState {
    /// Set once paging has terminated; the state is read-only afterwards
    pub completed: bool,
    pub labels: BTreeMap<LabelId, Label>,
    /// Message ids requested per listing page
    pub page_size: u32,
    /// Listing cursor of the next page to fetch (None = first page, or done)
    pub cursor: Option<String>,
    /// Messages listed on all folded pages, including failed fetches
    pub processed_count: u64,
    /// Messages whose metadata could not be fetched and were left out
    #[serde(default)]
    pub failed_count: u64,
    #[serde(default)]
    pub termination: Option<Termination>,
}

impl AggregationState {
    /// Fresh state for a scan that has not started yet
    pub fn new(page_size: u32) -> Self {
        Self {
            completed: false,
            labels: BTreeMap::new(),
            page_size,
            cursor: None,
            processed_count: 0,
            failed_count: 0,
            termination: None,
        }
    }

    /// Install the label catalog fetched at the start of a run
    pub fn install_labels(&mut self, labels: BTreeMap<LabelId, Label>) {
        self.labels = labels;
    }

    pub fn total_size(&self) -> u64 {
        self.labels.values().map(|l| l.total_size).sum()
    }

    /// Fold one completed page into the totals.
    ///
    /// Every label referenced by the tally must already be in the catalog;
    /// otherwise nothing is changed and the first offending label is
    /// reported.
    pub fn apply_page(
        &mut self,
        tally: PageTally,
        page_len: u64,
        next_cursor: Option<String>,
    ) -> Result<(), UnknownLabelError> {
        debug_assert!(!self.completed, "completed state must not be mutated");

        if let Some((label_id, delta)) = tally
            .deltas
            .iter()
            .find(|(id, _)| !self.labels.contains_key(*id))
        {
            return Err(UnknownLabelError {
                item_id: delta.first_item.clone(),
                label_id: label_id.clone(),
            });
        }

        for (label_id, delta) in tally.deltas {
            if let Some(label) = self.labels.get_mut(&label_id) {
                label.add(delta.size, delta.count);
            }
        }

        self.processed_count += page_len;
        self.failed_count += tally.failed;
        self.cursor = next_cursor;
        Ok(())
    }

    /// Mark the scan as terminated. The cursor is left untouched so a
    /// stalled token stays visible in the checkpoint.
    pub fn mark_done(&mut self, termination: Termination) {
        self.completed = true;
        self.termination = Some(termination);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct LabelDelta {
    size: u64,
    count: u64,
    /// First message seen with this label, for error reporting
    first_item: MessageId,
}

/// Per-label deltas of one page, accumulated before touching the state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageTally {
    deltas: BTreeMap<LabelId, LabelDelta>,
    folded: u64,
    failed: u64,
}

impl PageTally {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one message: its size and a count of one go to every label it carries
    pub fn add(&mut self, item: &ItemMetadata) {
        for label_id in &item.label_ids {
            let delta = self
                .deltas
                .entry(label_id.clone())
                .or_insert_with(|| LabelDelta {
                    size: 0,
                    count: 0,
                    first_item: item.id.clone(),
                });
            delta.size += item.size_estimate;
            delta.count += 1;
        }
        self.folded += 1;
    }

    /// Record a message that was listed but could not be fetched
    pub fn add_failure(&mut self) {
        self.failed += 1;
    }

    pub fn folded(&self) -> u64 {
        self.folded
    }

    pub fn failed(&self) -> u64 {
        self.failed
    }
}
