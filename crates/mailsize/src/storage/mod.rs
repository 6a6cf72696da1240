//! Checkpoint storage
//!
//! The pipeline talks to a [`CheckpointStore`]; the file implementation is
//! used in production and the in-memory one in tests. Both hold serialized
//! snapshots only, never a live reference to the state.

mod file;
mod format;
mod memory;
mod traits;

pub use file::FileCheckpointStore;
pub use format::CHECKPOINT_VERSION;
pub use memory::InMemoryCheckpointStore;
pub use traits::CheckpointStore;
