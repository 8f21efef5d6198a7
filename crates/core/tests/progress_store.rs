//! Progress persistence across tracker instances and backends.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tempfile::TempDir;

use audiograb_core::error::ErrorKind;
use audiograb_core::progress::{
    FileProgressStore, MemoryProgressStore, ProgressRecord, ProgressStore, ProgressTracker, Stage,
};

fn aged(id: &str, secs: i64) -> ProgressRecord {
    ProgressRecord::new(id, Stage::Downloading, 50.0, "halfway")
        .unwrap()
        .at(Utc::now() - chrono::Duration::seconds(secs))
}

#[test]
fn test_cleanup_removes_only_old_records_in_both_backends() {
    let dir = TempDir::new().unwrap();
    let stores: Vec<Arc<dyn ProgressStore>> = vec![
        Arc::new(FileProgressStore::new(dir.path()).unwrap()),
        Arc::new(MemoryProgressStore::new(Duration::from_secs(86_400))),
    ];

    for store in stores {
        store.put(&aged("old", 7200)).unwrap();
        store.put(&aged("fresh", 60)).unwrap();

        let removed = store.cleanup(Duration::from_secs(3600)).unwrap();
        assert_eq!(removed, 1, "{}", store.backend_name());
        assert!(store.get("old").unwrap().is_none());
        assert!(store.get("fresh").unwrap().is_some());

        assert_eq!(store.cleanup(Duration::from_secs(3600)).unwrap(), 0);
    }
}

#[test]
fn test_records_survive_a_new_tracker() {
    let dir = TempDir::new().unwrap();

    {
        let store = Arc::new(FileProgressStore::new(dir.path()).unwrap());
        let tracker = ProgressTracker::new(store, Duration::from_millis(100));
        tracker.update("job-1", Stage::Converting, 40.0, "Converting").unwrap();
        tracker.update("job-2", Stage::Error, -1.0, "Download failed").unwrap();
    }

    let store = Arc::new(FileProgressStore::new(dir.path()).unwrap());
    let tracker = ProgressTracker::new(store, Duration::from_millis(100));

    let converting = tracker.get("job-1").unwrap().unwrap();
    assert_eq!(converting.stage(), Stage::Converting);
    assert_eq!(converting.percentage(), Some(40.0));
    assert_eq!(converting.message(), "Converting");

    let failed = tracker.get("job-2").unwrap().unwrap();
    assert_eq!(failed.stage(), Stage::Error);
    assert_eq!(failed.percentage(), None);

    let json = std::fs::read_to_string(dir.path().join("job-2.json")).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["stage"], "error");
    assert!(value["percentage"].is_null());
}

#[test]
fn test_tracker_rejects_bad_updates() {
    let store = Arc::new(MemoryProgressStore::new(Duration::from_secs(60)));
    let tracker = ProgressTracker::new(store, Duration::ZERO);

    for (stage, pct) in [("downloading", 101.0), ("converting", -0.5), ("starting", -1.0)] {
        let err = tracker.update_raw("job", stage, pct, "x").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ProgressValidationFailure);
    }
    let err = tracker.update_raw("job", "paused", 10.0, "x").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ProgressValidationFailure);
    assert!(tracker.get("job").unwrap().is_none());
}
