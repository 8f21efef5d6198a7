//! In-memory progress store with TTL expiry.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

use super::error::ProgressError;
use super::store::{to_chrono, ProgressStore};
use super::types::{validate_id, ProgressRecord};

#[derive(Debug, Clone)]
struct Entry {
    record: ProgressRecord,
    /// `None` when the TTL reaches past what `Instant` can represent.
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

/// Cache-style store: entries disappear `ttl` after their last write.
#[derive(Debug)]
pub struct MemoryProgressStore {
    entries: RwLock<HashMap<String, Entry>>,
    ttl: Duration,
}

impl MemoryProgressStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Number of live (unexpired) entries.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.read().values().filter(|e| e.is_live(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Entry>> {
        self.entries.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Entry>> {
        self.entries.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl ProgressStore for MemoryProgressStore {
    fn put(&self, record: &ProgressRecord) -> Result<(), ProgressError> {
        validate_id(record.id())?;
        let entry = Entry {
            record: record.clone(),
            expires_at: Instant::now().checked_add(self.ttl),
        };
        self.write().insert(record.id().to_string(), entry);
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<ProgressRecord>, ProgressError> {
        validate_id(id)?;
        let now = Instant::now();
        {
            let entries = self.read();
            match entries.get(id) {
                Some(entry) if entry.is_live(now) => return Ok(Some(entry.record.clone())),
                Some(_) => {}
                None => return Ok(None),
            }
        }
        self.write().remove(id);
        Ok(None)
    }

    fn delete(&self, id: &str) -> Result<bool, ProgressError> {
        validate_id(id)?;
        Ok(self.write().remove(id).is_some())
    }

    fn cleanup(&self, max_age: Duration) -> Result<usize, ProgressError> {
        let now = Utc::now();
        let instant_now = Instant::now();
        let limit = to_chrono(max_age);

        let mut entries = self.write();
        let before = entries.len();
        entries.retain(|_, e| e.is_live(instant_now) && e.record.age(now) <= limit);
        Ok(before - entries.len())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
