//! mailsize - Per-label storage statistics for a Gmail mailbox
//!
//! This crate provides:
//! - Domain models (Label, ItemMetadata, AggregationState)
//! - Gmail API client and OAuth authentication behind service traits
//! - A resumable scan: paged listing, bounded parallel fetching,
//!   per-page folding and checkpointing
//! - Checkpoint storage with atomic file replacement
//! - Human-readable reporting of the collected totals
//!
//! The scan is synchronous; parallelism within a page comes from a
//! dedicated rayon pool sized to the requested concurrency.

pub mod config;
pub mod error;
pub mod gmail;
pub mod models;
pub mod report;
pub mod scan;
pub mod storage;

pub use config::{CredentialSource, GmailCredentials};
pub use error::{CheckpointError, Interrupted, ItemFetchError, ScanError, UnknownLabelError};
pub use gmail::{
    Credential, CredentialProvider, GmailAuth, GmailClient, InMemoryMailbox, LabelInfo,
    MailboxService, MessageHandle, MessagePage,
};
pub use models::{
    AggregationState, ItemMetadata, Label, LabelCategory, LabelId, MessageId, PageTally,
    Termination,
};
pub use report::{format_size, relevant_labels, stat_line, summary_lines};
pub use scan::{
    BatchFetcher, BatchResults, CancelFlag, ItemFetcher, ScanOptions, ScanOutcome, Scanner,
    fetch_all_labels, load_or_create_state,
};
pub use storage::{CheckpointStore, FileCheckpointStore, InMemoryCheckpointStore};
