//! Error types for binary resolution.

use std::path::PathBuf;
use thiserror::Error;

use crate::error::ErrorKind;

use super::resolver::Attempt;

/// Errors that can occur while resolving a binary.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// Every strategy was tried and none produced a file.
    #[error("{report}")]
    NotFound {
        name: String,
        attempts: Vec<Attempt>,
        guidance: String,
        report: String,
    },

    /// A candidate exists but is not executable.
    #[error("Binary '{name}' found at {path} but it is not executable. {remediation}")]
    NotExecutable {
        name: String,
        path: PathBuf,
        remediation: String,
    },

    /// The logical name was empty.
    #[error("Binary name must not be empty")]
    EmptyName,
}

impl ResolveError {
    /// Creates a not-found error, rendering the full diagnostic.
    pub fn not_found(name: impl Into<String>, attempts: Vec<Attempt>, guidance: String) -> Self {
        let name = name.into();
        let mut report = format!(
            "Binary '{}' not found after {} attempts. Tried:\n",
            name,
            attempts.len()
        );
        for attempt in &attempts {
            report.push_str(&format!(
                "  - [{}] {}\n",
                attempt.strategy.label(),
                attempt.path.display()
            ));
        }
        report.push('\n');
        report.push_str(&guidance);

        Self::NotFound {
            name,
            attempts,
            guidance,
            report,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } | Self::EmptyName => ErrorKind::BinaryNotFound,
            Self::NotExecutable { .. } => ErrorKind::BinaryNotExecutable,
        }
    }

    pub fn remediation(&self) -> Option<&str> {
        match self {
            Self::NotFound { guidance, .. } => Some(guidance),
            Self::NotExecutable { remediation, .. } => Some(remediation),
            Self::EmptyName => None,
        }
    }

    /// Attempted candidates, empty unless this is a not-found error.
    pub fn attempts(&self) -> &[Attempt] {
        match self {
            Self::NotFound { attempts, .. } => attempts,
            _ => &[],
        }
    }
}
