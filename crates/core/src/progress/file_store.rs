//! Durable progress store: one JSON file per id.

use chrono::Utc;
use std::fs;
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, warn};

use super::error::ProgressError;
use super::store::{to_chrono, ProgressStore};
use super::types::{validate_id, ProgressRecord};

const RECORD_EXT: &str = "json";
const TEMP_EXT: &str = "tmp";

/// Stores each record as `<dir>/<id>.json`, replaced atomically on update.
#[derive(Debug, Clone)]
pub struct FileProgressStore {
    dir: PathBuf,
}

impl FileProgressStore {
    /// Opens a store, creating the directory if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, ProgressError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| ProgressError::directory_unavailable(&dir, e))?;

        let meta = fs::metadata(&dir).map_err(|e| ProgressError::directory_unavailable(&dir, e))?;
        if !meta.is_dir() {
            return Err(ProgressError::directory_unavailable(&dir, "not a directory"));
        }
        if meta.permissions().readonly() {
            return Err(ProgressError::directory_unavailable(&dir, "directory is read-only"));
        }

        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", id, RECORD_EXT))
    }

    /// Temp files start with '.', which no valid id does.
    fn temp_path(&self, id: &str) -> PathBuf {
        self.dir
            .join(format!(".{}.{}.{}", id, uuid::Uuid::new_v4(), TEMP_EXT))
    }
}

impl ProgressStore for FileProgressStore {
    fn put(&self, record: &ProgressRecord) -> Result<(), ProgressError> {
        validate_id(record.id())?;
        let data = serde_json::to_vec_pretty(record)?;

        let temp = self.temp_path(record.id());
        fs::write(&temp, &data).map_err(|e| map_write_error(&self.dir, e))?;
        if let Err(e) = fs::rename(&temp, self.record_path(record.id())) {
            let _ = fs::remove_file(&temp);
            return Err(map_write_error(&self.dir, e));
        }
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<ProgressRecord>, ProgressError> {
        validate_id(id)?;
        match fs::read(self.record_path(id)) {
            Ok(data) => Ok(Some(serde_json::from_slice(&data)?)),
            Err(e) if e.kind() == IoErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn delete(&self, id: &str) -> Result<bool, ProgressError> {
        validate_id(id)?;
        match fs::remove_file(self.record_path(id)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == IoErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn cleanup(&self, max_age: Duration) -> Result<usize, ProgressError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == IoErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let now = Utc::now();
        let limit = to_chrono(max_age);
        let mut removed = 0;

        for entry in entries.flatten() {
            let path = entry.path();
            let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
                continue;
            };

            let expired = match ext {
                RECORD_EXT => match fs::read(&path)
                    .ok()
                    .and_then(|data| serde_json::from_slice::<ProgressRecord>(&data).ok())
                {
                    Some(record) => record.age(now) > limit,
                    None => {
                        warn!("Unreadable progress record {:?}, using file age", path);
                        older_than(&path, max_age)
                    }
                },
                TEMP_EXT => older_than(&path, max_age),
                _ => false,
            };

            if expired {
                match fs::remove_file(&path) {
                    Ok(()) => {
                        if ext == RECORD_EXT {
                            removed += 1;
                        }
                    }
                    Err(e) if e.kind() == IoErrorKind::NotFound => {}
                    Err(e) => warn!("Failed to remove stale progress file {:?}: {}", path, e),
                }
            }
        }

        if removed > 0 {
            debug!("Removed {} stale progress records from {:?}", removed, self.dir);
        }
        Ok(removed)
    }

    fn backend_name(&self) -> &'static str {
        "file"
    }
}

fn older_than(path: &Path, max_age: Duration) -> bool {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|modified| SystemTime::now().duration_since(modified).ok())
        .map(|age| age > max_age)
        .unwrap_or(false)
}

fn map_write_error(dir: &Path, e: std::io::Error) -> ProgressError {
    match e.kind() {
        IoErrorKind::NotFound | IoErrorKind::PermissionDenied => {
            ProgressError::directory_unavailable(dir, e)
        }
        _ => e.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::progress::{Stage, ERROR_SENTINEL};
    use tempfile::TempDir;

    #[test]
    fn test_put_get_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = FileProgressStore::new(dir.path().join("progress")).unwrap();

        let record = ProgressRecord::new("job-1", Stage::Downloading, 42.5, "Downloading").unwrap();
        store.put(&record).unwrap();

        let loaded = store.get("job-1").unwrap().unwrap();
        assert_eq!(loaded.id(), "job-1");
        assert_eq!(loaded.stage(), Stage::Downloading);
        assert_eq!(loaded.percentage(), Some(42.5));
        assert_eq!(loaded.message(), "Downloading");
        assert!(dir.path().join("progress").join("job-1.json").is_file());
    }

    #[test]
    fn test_put_overwrites_and_leaves_no_temp_files() {
        let dir = TempDir::new().unwrap();
        let store = FileProgressStore::new(dir.path()).unwrap();

        store
            .put(&ProgressRecord::new("a", Stage::Starting, 0.0, "start").unwrap())
            .unwrap();
        store
            .put(&ProgressRecord::new("a", Stage::Error, ERROR_SENTINEL, "boom").unwrap())
            .unwrap();

        let loaded = store.get("a").unwrap().unwrap();
        assert_eq!(loaded.stage(), Stage::Error);
        assert_eq!(loaded.percentage(), None);

        let names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.json"]);
    }

    #[test]
    fn test_missing_and_delete() {
        let dir = TempDir::new().unwrap();
        let store = FileProgressStore::new(dir.path()).unwrap();

        assert!(store.get("nothing").unwrap().is_none());
        assert!(!store.delete("nothing").unwrap());

        store
            .put(&ProgressRecord::new("x", Stage::Completed, 100.0, "done").unwrap())
            .unwrap();
        assert!(store.delete("x").unwrap());
        assert!(store.get("x").unwrap().is_none());
    }

    #[test]
    fn test_rejects_path_like_ids() {
        let dir = TempDir::new().unwrap();
        let store = FileProgressStore::new(dir.path()).unwrap();
        let err = store.get("../escape").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ProgressValidationFailure);
    }

    #[test]
    fn test_cleanup_removes_only_old_records() {
        let dir = TempDir::new().unwrap();
        let store = FileProgressStore::new(dir.path()).unwrap();
        let now = Utc::now();

        let old = ProgressRecord::new("old", Stage::Completed, 100.0, "done")
            .unwrap()
            .at(now - chrono::Duration::seconds(7200));
        let fresh = ProgressRecord::new("fresh", Stage::Downloading, 10.0, "dl")
            .unwrap()
            .at(now - chrono::Duration::seconds(60));
        store.put(&old).unwrap();
        store.put(&fresh).unwrap();

        let removed = store.cleanup(Duration::from_secs(3600)).unwrap();
        assert_eq!(removed, 1);
        assert!(store.get("old").unwrap().is_none());
        assert!(store.get("fresh").unwrap().is_some());

        assert_eq!(store.cleanup(Duration::from_secs(3600)).unwrap(), 0);
    }

    #[test]
    fn test_cleanup_on_empty_store() {
        let dir = TempDir::new().unwrap();
        let store = FileProgressStore::new(dir.path()).unwrap();
        assert_eq!(store.cleanup(Duration::from_secs(0)).unwrap(), 0);
    }

    #[test]
    fn test_directory_unavailable_when_path_is_file() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("occupied");
        fs::write(&file, "x").unwrap();

        let err = FileProgressStore::new(&file).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DirectoryUnavailable);
    }
}
