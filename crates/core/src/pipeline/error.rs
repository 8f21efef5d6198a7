//! Error types for the conversion pipeline.

use std::path::PathBuf;
use thiserror::Error;

use crate::error::ErrorKind;
use crate::executor::ExecutorError;
use crate::platform::ResolveError;
use crate::progress::ProgressError;

/// Errors raised while running a conversion job.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The source reference is empty, malformed, or not supported.
    #[error("Invalid source reference '{reference}': {reason}")]
    InvalidReference { reference: String, reason: String },

    /// A request option (quality, job id) is out of range.
    #[error("Invalid request: {reason}")]
    InvalidRequest { reason: String },

    /// A required binary could not be resolved.
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// A process could not be launched, failed, or timed out.
    #[error(transparent)]
    Executor(#[from] ExecutorError),

    /// Progress could not be recorded.
    #[error(transparent)]
    Progress(#[from] ProgressError),

    /// An output or temporary directory is missing, uncreatable, or not
    /// writable.
    #[error("Directory unavailable: {path}: {reason}")]
    DirectoryUnavailable { path: PathBuf, reason: String },

    /// The downloader's metadata output could not be understood.
    #[error("Could not read source metadata: {reason}")]
    Metadata { reason: String },

    /// A step finished successfully but its expected artifact is missing
    /// or empty.
    #[error("Expected output is missing or empty: {path}")]
    OutputMissing { path: PathBuf },

    /// Filesystem error outside the directories above.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    pub fn invalid_reference(reference: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidReference {
            reference: reference.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_request(reason: impl Into<String>) -> Self {
        Self::InvalidRequest {
            reason: reason.into(),
        }
    }

    pub fn directory_unavailable(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::DirectoryUnavailable {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn metadata(reason: impl Into<String>) -> Self {
        Self::Metadata {
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidReference { .. } | Self::InvalidRequest { .. } => {
                ErrorKind::InvalidReference
            }
            Self::Resolve(e) => e.kind(),
            Self::Executor(e) => e.kind(),
            Self::Progress(e) => e.kind(),
            Self::DirectoryUnavailable { .. } => ErrorKind::DirectoryUnavailable,
            Self::Metadata { .. } | Self::OutputMissing { .. } => {
                ErrorKind::ProcessExecutionFailed
            }
            Self::Io(_) => ErrorKind::Io,
        }
    }

    /// Whether this error aborts the whole job.
    pub fn is_fatal(&self) -> bool {
        self.kind().is_fatal()
    }

    pub fn remediation(&self) -> Option<&str> {
        match self {
            Self::InvalidReference { .. } => Some(
                "Pass a full http(s) URL of a video or playlist on one of the allowed hosts",
            ),
            Self::InvalidRequest { .. } => {
                Some("Use a quality between 32 and 512 kbps and a job id of letters, digits, '.', '_' or '-'")
            }
            Self::Resolve(e) => e.remediation(),
            Self::Executor(e) => e.remediation(),
            Self::Progress(e) => e.remediation(),
            Self::DirectoryUnavailable { .. } => {
                Some("Create the directory and make sure it is writable, or change [paths] in the config")
            }
            Self::Metadata { .. } => {
                Some("Update the downloader (yt-dlp -U) and retry; the site may have changed")
            }
            Self::OutputMissing { .. } => Some("Retry the item; if it keeps failing, check free disk space"),
            Self::Io(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds_and_fatality() {
        let invalid = PipelineError::invalid_reference("", "empty");
        assert_eq!(invalid.kind(), ErrorKind::InvalidReference);
        assert!(invalid.is_fatal());

        let dir = PipelineError::directory_unavailable("/out", "read-only");
        assert!(dir.is_fatal());

        let missing = PipelineError::OutputMissing {
            path: PathBuf::from("/tmp/x.mp3"),
        };
        assert!(!missing.is_fatal());

        let timeout = PipelineError::from(ExecutorError::Timeout {
            command: "yt-dlp".to_string(),
            timeout_secs: 5,
        });
        assert_eq!(timeout.kind(), ErrorKind::ProcessTimeout);
        assert!(!timeout.is_fatal());
        assert!(timeout.remediation().is_some());
    }
}
