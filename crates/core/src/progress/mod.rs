//! Per-item progress tracking.
//!
//! A [`ProgressTracker`] validates updates and persists them through any
//! [`ProgressStore`]: [`FileProgressStore`] keeps one JSON file per id,
//! [`MemoryProgressStore`] is a TTL cache. Records are what external pollers
//! read: `{ stage, percentage, message }` plus id and timestamp.

mod config;
mod error;
mod file_store;
mod memory_store;
mod store;
mod tracker;
mod types;

pub use config::{ProgressBackend, ProgressConfig, MAX_TTL_SECS};
pub use error::ProgressError;
pub use file_store::FileProgressStore;
pub use memory_store::MemoryProgressStore;
pub use store::ProgressStore;
pub use tracker::ProgressTracker;
pub use types::{validate_id, ProgressRecord, Stage, ERROR_SENTINEL, MAX_ID_LEN};
