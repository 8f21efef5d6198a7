//! Validating, throttled front end over a progress store.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::debug;

use super::config::{ProgressBackend, ProgressConfig};
use super::error::ProgressError;
use super::file_store::FileProgressStore;
use super::memory_store::MemoryProgressStore;
use super::store::ProgressStore;
use super::types::{validate_id, ProgressRecord, Stage};
use crate::metrics;

#[derive(Debug)]
struct Slot {
    last_write: Instant,
    last_stage: Stage,
    pending: Option<ProgressRecord>,
}

/// Records per-item progress.
///
/// Same-stage updates for an id arriving within the throttle window are
/// held back instead of written; stage changes always reach the store.
/// [`get`](Self::get) sees held-back values, so callers always observe the
/// most recent update.
pub struct ProgressTracker {
    store: Arc<dyn ProgressStore>,
    throttle: Duration,
    slots: Mutex<HashMap<String, Slot>>,
}

impl ProgressTracker {
    pub fn new(store: Arc<dyn ProgressStore>, throttle: Duration) -> Self {
        Self {
            store,
            throttle,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Builds the configured backend. `dir` is only used by the file backend.
    pub fn from_config(config: &ProgressConfig, dir: &Path) -> Result<Self, ProgressError> {
        let store: Arc<dyn ProgressStore> = match config.backend {
            ProgressBackend::File => Arc::new(FileProgressStore::new(dir)?),
            ProgressBackend::Memory => {
                Arc::new(MemoryProgressStore::new(Duration::from_secs(config.ttl_secs)))
            }
        };
        debug!("Progress tracking with {} backend", store.backend_name());
        Ok(Self::new(store, Duration::from_millis(config.throttle_ms)))
    }

    pub fn store(&self) -> &Arc<dyn ProgressStore> {
        &self.store
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<String, Slot>> {
        self.slots.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Validates and records an update.
    pub fn update(
        &self,
        id: &str,
        stage: Stage,
        percentage: f32,
        message: &str,
    ) -> Result<(), ProgressError> {
        let record = ProgressRecord::new(id, stage, percentage, message)?;
        self.record(record)
    }

    /// Like [`update`](Self::update), with the stage given by name.
    pub fn update_raw(
        &self,
        id: &str,
        stage: &str,
        percentage: f32,
        message: &str,
    ) -> Result<(), ProgressError> {
        self.update(id, stage.parse()?, percentage, message)
    }

    /// Records an already validated record, applying throttling.
    pub fn record(&self, record: ProgressRecord) -> Result<(), ProgressError> {
        let now = Instant::now();
        let mut slots = self.slots();

        if let Some(slot) = slots.get_mut(record.id()) {
            if slot.last_stage == record.stage()
                && !record.stage().is_terminal()
                && now.duration_since(slot.last_write) < self.throttle
            {
                slot.pending = Some(record);
                metrics::PROGRESS_COALESCED.inc();
                return Ok(());
            }
        }

        self.store.put(&record)?;
        metrics::PROGRESS_WRITES.inc();

        if record.stage().is_terminal() {
            slots.remove(record.id());
        } else {
            slots.insert(
                record.id().to_string(),
                Slot {
                    last_write: now,
                    last_stage: record.stage(),
                    pending: None,
                },
            );
        }
        Ok(())
    }

    /// The most recent record for an id, including held-back updates.
    pub fn get(&self, id: &str) -> Result<Option<ProgressRecord>, ProgressError> {
        validate_id(id)?;
        if let Some(pending) = self.slots().get(id).and_then(|s| s.pending.clone()) {
            return Ok(Some(pending));
        }
        self.store.get(id)
    }

    pub fn delete(&self, id: &str) -> Result<bool, ProgressError> {
        validate_id(id)?;
        self.slots().remove(id);
        self.store.delete(id)
    }

    /// Removes records older than `max_age` from the store.
    pub fn cleanup(&self, max_age: Duration) -> Result<usize, ProgressError> {
        let removed = self.store.cleanup(max_age)?;
        if removed > 0 {
            debug!("Progress cleanup removed {} records", removed);
        }
        Ok(removed)
    }

    /// Writes every held-back update. Returns how many were written.
    pub fn flush(&self) -> Result<usize, ProgressError> {
        let mut slots = self.slots();
        let mut written = 0;
        for slot in slots.values_mut() {
            if let Some(record) = slot.pending.take() {
                self.store.put(&record)?;
                slot.last_write = Instant::now();
                metrics::PROGRESS_WRITES.inc();
                written += 1;
            }
        }
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::progress::ERROR_SENTINEL;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts writes on top of a memory store.
    struct CountingStore {
        inner: MemoryProgressStore,
        puts: AtomicUsize,
    }

    impl CountingStore {
        fn new() -> Self {
            Self {
                inner: MemoryProgressStore::new(Duration::from_secs(60)),
                puts: AtomicUsize::new(0),
            }
        }
    }

    impl ProgressStore for CountingStore {
        fn put(&self, record: &ProgressRecord) -> Result<(), ProgressError> {
            self.puts.fetch_add(1, Ordering::SeqCst);
            self.inner.put(record)
        }
        fn get(&self, id: &str) -> Result<Option<ProgressRecord>, ProgressError> {
            self.inner.get(id)
        }
        fn delete(&self, id: &str) -> Result<bool, ProgressError> {
            self.inner.delete(id)
        }
        fn cleanup(&self, max_age: Duration) -> Result<usize, ProgressError> {
            self.inner.cleanup(max_age)
        }
        fn backend_name(&self) -> &'static str {
            "counting"
        }
    }

    #[test]
    fn test_update_then_get() {
        let tracker = ProgressTracker::new(
            Arc::new(MemoryProgressStore::new(Duration::from_secs(60))),
            Duration::ZERO,
        );
        tracker
            .update("item", Stage::Downloading, 12.5, "Downloading")
            .unwrap();

        let record = tracker.get("item").unwrap().unwrap();
        assert_eq!(record.id(), "item");
        assert_eq!(record.stage(), Stage::Downloading);
        assert_eq!(record.percentage(), Some(12.5));
        assert_eq!(record.message(), "Downloading");
    }

    #[test]
    fn test_rejects_bad_input() {
        let tracker = ProgressTracker::new(
            Arc::new(MemoryProgressStore::new(Duration::from_secs(60))),
            Duration::ZERO,
        );

        let err = tracker.update_raw("item", "paused", 10.0, "").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ProgressValidationFailure);

        let err = tracker.update("item", Stage::Converting, 101.0, "").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ProgressValidationFailure);

        tracker
            .update_raw("item", "error", ERROR_SENTINEL, "failed")
            .unwrap();
        assert_eq!(tracker.get("item").unwrap().unwrap().percentage(), None);
    }

    #[test]
    fn test_same_stage_updates_are_coalesced() {
        let store = Arc::new(CountingStore::new());
        let tracker = ProgressTracker::new(store.clone(), Duration::from_secs(60));

        tracker.update("c", Stage::Downloading, 1.0, "").unwrap();
        tracker.update("c", Stage::Downloading, 2.0, "").unwrap();
        tracker.update("c", Stage::Downloading, 3.0, "").unwrap();
        assert_eq!(store.puts.load(Ordering::SeqCst), 1);

        // Held-back value is still visible.
        assert_eq!(tracker.get("c").unwrap().unwrap().percentage(), Some(3.0));

        // A stage change writes through immediately.
        tracker.update("c", Stage::Converting, 0.0, "").unwrap();
        assert_eq!(store.puts.load(Ordering::SeqCst), 2);
        assert_eq!(
            store.get("c").unwrap().unwrap().stage(),
            Stage::Converting
        );
    }

    #[test]
    fn test_flush_writes_pending() {
        let store = Arc::new(CountingStore::new());
        let tracker = ProgressTracker::new(store.clone(), Duration::from_secs(60));

        tracker.update("f", Stage::Downloading, 10.0, "").unwrap();
        tracker.update("f", Stage::Downloading, 55.0, "").unwrap();
        assert_eq!(tracker.flush().unwrap(), 1);
        assert_eq!(store.get("f").unwrap().unwrap().percentage(), Some(55.0));
        assert_eq!(tracker.flush().unwrap(), 0);
    }

    #[test]
    fn test_terminal_update_always_written() {
        let store = Arc::new(CountingStore::new());
        let tracker = ProgressTracker::new(store.clone(), Duration::from_secs(60));

        tracker.update("t", Stage::Completed, 100.0, "done").unwrap();
        tracker.update("t", Stage::Completed, 100.0, "done").unwrap();
        assert_eq!(store.puts.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_delete_drops_pending() {
        let tracker = ProgressTracker::new(
            Arc::new(MemoryProgressStore::new(Duration::from_secs(60))),
            Duration::from_secs(60),
        );
        tracker.update("d", Stage::Downloading, 1.0, "").unwrap();
        tracker.update("d", Stage::Downloading, 2.0, "").unwrap();
        assert!(tracker.delete("d").unwrap());
        assert!(tracker.get("d").unwrap().is_none());
    }
}
