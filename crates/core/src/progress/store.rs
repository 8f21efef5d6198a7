//! Progress storage trait.

use std::time::Duration;

use super::error::ProgressError;
use super::types::ProgressRecord;

/// Storage for progress records, one record per id.
///
/// Writes are last-writer-wins: `put` replaces whatever was stored for the
/// id. Readers may call `get` concurrently with the single writer.
pub trait ProgressStore: Send + Sync {
    /// Stores a record, replacing any previous record with the same id.
    fn put(&self, record: &ProgressRecord) -> Result<(), ProgressError>;

    /// Returns the record for an id, if present.
    fn get(&self, id: &str) -> Result<Option<ProgressRecord>, ProgressError>;

    /// Removes a record. Returns whether one existed.
    fn delete(&self, id: &str) -> Result<bool, ProgressError>;

    /// Removes every record whose timestamp is older than `max_age`.
    /// Returns the number of records removed.
    fn cleanup(&self, max_age: Duration) -> Result<usize, ProgressError>;

    /// Short backend name for logs.
    fn backend_name(&self) -> &'static str;
}

/// Converts a std duration into a chrono one, saturating on overflow.
pub(crate) fn to_chrono(max_age: Duration) -> chrono::Duration {
    chrono::Duration::from_std(max_age).unwrap_or(chrono::Duration::MAX)
}
