//! Per-item progress reporting.

use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::metrics;
use crate::progress::{ProgressTracker, Stage, ERROR_SENTINEL};

/// Emits progress for one item and keeps it on the item state machine.
///
/// Updates that would move backwards or leave a terminal stage are
/// dropped. Tracker failures are logged and never fail the item.
pub struct ItemReporter {
    tracker: Arc<ProgressTracker>,
    id: String,
    stage: Option<Stage>,
}

impl ItemReporter {
    pub fn new(tracker: Arc<ProgressTracker>, id: impl Into<String>) -> Self {
        Self {
            tracker,
            id: id.into(),
            stage: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Last stage emitted, if any.
    pub fn stage(&self) -> Option<Stage> {
        self.stage
    }

    pub fn is_finished(&self) -> bool {
        self.stage.is_some_and(|s| s.is_terminal())
    }

    pub fn starting(&mut self, message: &str) {
        self.emit(Stage::Starting, 0.0, message);
    }

    pub fn downloading(&mut self, percentage: f32) {
        self.emit(
            Stage::Downloading,
            percentage,
            &format!("Downloading: {:.1}%", percentage),
        );
    }

    pub fn converting(&mut self, percentage: f32) {
        self.emit(
            Stage::Converting,
            percentage,
            &format!("Converting: {:.1}%", percentage),
        );
    }

    pub fn completed(&mut self, output: &Path) {
        self.emit(
            Stage::Completed,
            100.0,
            &format!("Saved to {}", output.display()),
        );
    }

    pub fn error(&mut self, message: &str) {
        self.emit(Stage::Error, ERROR_SENTINEL, message);
    }

    pub fn cancelled(&mut self, message: &str) {
        self.emit(Stage::Cancelled, 0.0, message);
    }

    fn emit(&mut self, stage: Stage, percentage: f32, message: &str) {
        if let Some(current) = self.stage {
            if !current.can_transition_to(stage) {
                debug!(
                    "Dropping {} update for {}: already {}",
                    stage, self.id, current
                );
                return;
            }
        }

        match self.tracker.update(&self.id, stage, percentage, message) {
            Ok(()) => {}
            Err(e) => warn!("Failed to record progress for {}: {}", self.id, e),
        }
        self.stage = Some(stage);

        if stage.is_terminal() {
            metrics::ITEMS_FINISHED
                .with_label_values(&[stage.as_str()])
                .inc();
        }
    }
}
