//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Process execution (counts by binary and outcome, wall-clock duration)
//! - Conversion items (terminal status)
//! - Progress tracking (persisted writes vs. coalesced updates)

use once_cell::sync::Lazy;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};

/// Registry holding every core metric.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    for metric in all_metrics() {
        // Registration only fails on duplicate names, which would be a bug here.
        let _ = registry.register(metric);
    }
    registry
});

// =============================================================================
// Process Execution Metrics
// =============================================================================

/// External process runs by binary and outcome.
pub static PROCESS_EXECUTIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "audiograb_process_executions_total",
            "Total external process executions",
        ),
        &["binary", "outcome"], // "success", "failed", "signaled", "timeout", "spawn_error"
    )
    .unwrap()
});

/// External process wall-clock duration in seconds.
pub static PROCESS_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "audiograb_process_duration_seconds",
            "Wall-clock duration of external processes",
        )
        .buckets(vec![
            0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1800.0,
        ]),
        &["binary"],
    )
    .unwrap()
});

// =============================================================================
// Pipeline Metrics
// =============================================================================

/// Conversion items by terminal status.
pub static ITEMS_FINISHED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "audiograb_items_finished_total",
            "Conversion items by terminal status",
        ),
        &["status"], // "completed", "error", "cancelled"
    )
    .unwrap()
});

/// Jobs stopped by a fatal error, either rejected up front
/// (`phase="rejected"`) or cut short after items started (`phase="mid_job"`).
pub static JOBS_ABORTED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "audiograb_jobs_aborted_total",
            "Jobs aborted by a fatal error",
        ),
        &["phase", "kind"],
    )
    .unwrap()
});

// =============================================================================
// Progress Metrics
// =============================================================================

/// Progress records written to the store.
pub static PROGRESS_WRITES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "audiograb_progress_writes_total",
        "Progress records persisted to the store",
    )
    .unwrap()
});

/// Progress updates coalesced by throttling.
pub static PROGRESS_COALESCED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "audiograb_progress_coalesced_total",
        "Progress updates held back by throttling",
    )
    .unwrap()
});

/// Returns all core metrics for registration.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(PROCESS_EXECUTIONS.clone()),
        Box::new(PROCESS_DURATION.clone()),
        Box::new(ITEMS_FINISHED.clone()),
        Box::new(JOBS_ABORTED.clone()),
        Box::new(PROGRESS_WRITES.clone()),
        Box::new(PROGRESS_COALESCED.clone()),
    ]
}

/// Renders every core metric in the Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::warn!("Failed to encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
