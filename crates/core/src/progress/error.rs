//! Error types for progress tracking.

use std::path::PathBuf;
use thiserror::Error;

use super::types::Stage;
use crate::error::ErrorKind;

/// Errors that can occur while recording or reading progress.
#[derive(Debug, Error)]
pub enum ProgressError {
    /// The stage name is not one of the recognized stages.
    #[error("Unknown progress stage: '{stage}'")]
    UnknownStage { stage: String },

    /// The percentage is outside [0, 100] (or the sentinel was used outside
    /// the error stage).
    #[error("Invalid percentage {percentage} for stage {stage}")]
    InvalidPercentage { stage: Stage, percentage: f32 },

    /// The identifier cannot be used as a record key.
    #[error("Invalid progress id '{id}': {reason}")]
    InvalidId { id: String, reason: String },

    /// The progress directory is missing and cannot be created, or is not
    /// writable.
    #[error("Progress directory unavailable: {path}: {reason}")]
    DirectoryUnavailable { path: PathBuf, reason: String },

    /// A stored record could not be decoded or encoded.
    #[error("Malformed progress record: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProgressError {
    pub fn invalid_id(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidId {
            id: id.into(),
            reason: reason.into(),
        }
    }

    pub fn directory_unavailable(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::DirectoryUnavailable {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownStage { .. } | Self::InvalidPercentage { .. } | Self::InvalidId { .. } => {
                ErrorKind::ProgressValidationFailure
            }
            Self::DirectoryUnavailable { .. } => ErrorKind::DirectoryUnavailable,
            Self::Serialization(_) | Self::Io(_) => ErrorKind::Io,
        }
    }

    pub fn remediation(&self) -> Option<&str> {
        match self {
            Self::UnknownStage { .. } => Some(
                "Use one of: starting, downloading, converting, completed, error, cancelled",
            ),
            Self::InvalidPercentage { .. } => {
                Some("Percentages must lie in [0, 100]; -1 is only valid for the error stage")
            }
            Self::InvalidId { .. } => {
                Some("Ids may contain letters, digits, '.', '_' and '-' and must not start with '.'")
            }
            Self::DirectoryUnavailable { .. } => {
                Some("Create the progress directory or make it writable, or switch to the memory backend")
            }
            Self::Serialization(_) | Self::Io(_) => None,
        }
    }
}
