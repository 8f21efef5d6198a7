//! Error types for process execution.

use std::path::PathBuf;
use thiserror::Error;

use crate::error::ErrorKind;

/// Errors that can occur while launching or supervising a process.
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// The process could not be started.
    #[error("Failed to launch {program}: {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The requested working directory does not exist.
    #[error("Working directory unavailable: {path}")]
    WorkingDirUnavailable { path: PathBuf },

    /// No writable temporary directory could be established.
    #[error("No writable temporary directory available (tried {tried})")]
    TempDirUnavailable { tried: String },

    /// The process ran and exited unsuccessfully.
    #[error("Command failed ({status}): {command}\n{stderr}")]
    ProcessFailed {
        command: String,
        status: String,
        exit_code: Option<i32>,
        stderr: String,
    },

    /// The process exceeded its timeout and was killed.
    #[error("Command timed out after {timeout_secs} seconds: {command}")]
    Timeout { command: String, timeout_secs: u64 },

    /// I/O error while reading process output.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ExecutorError {
    pub fn spawn(program: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Spawn {
            program: program.into(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Spawn { source, .. } => match source.kind() {
                std::io::ErrorKind::NotFound => ErrorKind::BinaryNotFound,
                std::io::ErrorKind::PermissionDenied => ErrorKind::BinaryNotExecutable,
                _ => ErrorKind::ProcessExecutionFailed,
            },
            Self::WorkingDirUnavailable { .. } | Self::TempDirUnavailable { .. } => {
                ErrorKind::DirectoryUnavailable
            }
            Self::ProcessFailed { .. } => ErrorKind::ProcessExecutionFailed,
            Self::Timeout { .. } => ErrorKind::ProcessTimeout,
            Self::Io(_) => ErrorKind::Io,
        }
    }

    pub fn remediation(&self) -> Option<&str> {
        match self {
            Self::Spawn { source, .. } => match source.kind() {
                std::io::ErrorKind::NotFound => {
                    Some("The binary disappeared after resolution; reinstall it and retry")
                }
                std::io::ErrorKind::PermissionDenied => {
                    Some("Make the binary executable (chmod +x) or unblock it, then retry")
                }
                _ => None,
            },
            Self::WorkingDirUnavailable { .. } => {
                Some("Create the working directory or point executor.working_dir elsewhere")
            }
            Self::TempDirUnavailable { .. } => {
                Some("Set TEMP/TMP (or TMPDIR) to a writable directory")
            }
            Self::ProcessFailed { .. } => {
                Some("Check the annotated error output above; retry once the cause is fixed")
            }
            Self::Timeout { .. } => {
                Some("Check network connectivity or raise the timeout, then retry")
            }
            Self::Io(_) => None,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Io(_))
    }
}
