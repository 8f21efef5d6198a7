//! Error kind taxonomy shared by every module.
//!
//! Each module owns its own `thiserror` enum; all of them map onto an
//! [`ErrorKind`] so callers can branch on the category of a failure
//! without parsing message text.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Category of a failure, independent of which module raised it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Every resolution strategy was exhausted.
    BinaryNotFound,
    /// A binary was found but lacks execute permission.
    BinaryNotExecutable,
    /// A process ran and exited unsuccessfully.
    ProcessExecutionFailed,
    /// A process exceeded its timeout and was killed.
    ProcessTimeout,
    /// The source reference is malformed, empty, or unsupported.
    InvalidReference,
    /// A working, output, temp, or progress directory is unusable.
    DirectoryUnavailable,
    /// A progress update carried an unknown stage or bad percentage.
    ProgressValidationFailure,
    /// The configuration could not be loaded or is invalid.
    Configuration,
    /// Any other I/O failure.
    Io,
}

impl ErrorKind {
    /// Whether a failure of this kind aborts a whole job rather than a
    /// single item.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::BinaryNotFound
                | Self::BinaryNotExecutable
                | Self::InvalidReference
                | Self::DirectoryUnavailable
                | Self::Configuration
        )
    }

    /// Stable snake_case name, used as a metrics label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BinaryNotFound => "binary_not_found",
            Self::BinaryNotExecutable => "binary_not_executable",
            Self::ProcessExecutionFailed => "process_execution_failed",
            Self::ProcessTimeout => "process_timeout",
            Self::InvalidReference => "invalid_reference",
            Self::DirectoryUnavailable => "directory_unavailable",
            Self::ProgressValidationFailure => "progress_validation_failure",
            Self::Configuration => "configuration",
            Self::Io => "io",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_kinds() {
        assert!(ErrorKind::BinaryNotFound.is_fatal());
        assert!(ErrorKind::BinaryNotExecutable.is_fatal());
        assert!(ErrorKind::DirectoryUnavailable.is_fatal());
        assert!(ErrorKind::InvalidReference.is_fatal());
        assert!(!ErrorKind::ProcessExecutionFailed.is_fatal());
        assert!(!ErrorKind::ProcessTimeout.is_fatal());
    }

    #[test]
    fn test_kind_serialization() {
        let json = serde_json::to_string(&ErrorKind::ProcessTimeout).unwrap();
        assert_eq!(json, "\"process_timeout\"");
        assert_eq!(ErrorKind::ProcessTimeout.to_string(), "process_timeout");
    }
}
