//! Domain models for label statistics

mod item;
mod label;
mod state;

pub use item::{ItemMetadata, MessageId};
pub use label::{Label, LabelCategory, LabelId};
pub use state::{AggregationState, PageTally, Termination};
