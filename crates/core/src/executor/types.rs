//! Types for the executor module.

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::error::ExecutorError;

/// A process to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionRequest {
    program: PathBuf,
    args: Vec<String>,
    working_dir: Option<PathBuf>,
    timeout: Option<Duration>,
}

impl ExecutionRequest {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
            timeout: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Sets the working directory. Falls back to the executor default.
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Sets the timeout. Falls back to the executor default.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn timeout_secs(self, secs: u64) -> Self {
        self.timeout(Duration::from_secs(secs))
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn arguments(&self) -> &[String] {
        &self.args
    }

    pub fn requested_working_dir(&self) -> Option<&Path> {
        self.working_dir.as_deref()
    }

    pub fn requested_timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Short binary name used for logs and metric labels.
    pub fn binary_name(&self) -> String {
        self.program
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| self.program.display().to_string())
    }

    /// The command line as a single display string, quoting arguments
    /// that contain whitespace.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.display().to_string())
            .chain(self.args.iter().cloned())
            .map(|part| {
                if part.is_empty() || part.contains(char::is_whitespace) {
                    format!("\"{}\"", part)
                } else {
                    part
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// How a process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "code")]
pub enum ExitOutcome {
    /// The process exited with a code.
    Exited(i32),
    /// The process was terminated by a signal.
    Signaled,
    /// The process exceeded its timeout and was killed.
    TimedOut,
}

impl ExitOutcome {
    pub fn success(&self) -> bool {
        matches!(self, Self::Exited(0))
    }

    pub fn code(&self) -> Option<i32> {
        match self {
            Self::Exited(code) => Some(*code),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::TimedOut)
    }

    /// Metric label for this outcome.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Exited(0) => "success",
            Self::Exited(_) => "failed",
            Self::Signaled => "signaled",
            Self::TimedOut => "timeout",
        }
    }
}

impl std::fmt::Display for ExitOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exited(code) => write!(f, "exit code {}", code),
            Self::Signaled => f.write_str("terminated by signal"),
            Self::TimedOut => f.write_str("timed out"),
        }
    }
}

/// The result of one process run.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionResult {
    outcome: ExitOutcome,
    stdout: String,
    stderr: String,
    duration: Duration,
    command_line: String,
    working_dir: PathBuf,
    timeout: Duration,
}

impl ExecutionResult {
    pub fn new(
        outcome: ExitOutcome,
        stdout: String,
        stderr: String,
        duration: Duration,
        command_line: String,
        working_dir: PathBuf,
        timeout: Duration,
    ) -> Self {
        Self {
            outcome,
            stdout,
            stderr,
            duration,
            command_line,
            working_dir,
            timeout,
        }
    }

    pub fn success(&self) -> bool {
        self.outcome.success()
    }

    pub fn outcome(&self) -> ExitOutcome {
        self.outcome
    }

    /// The exit code, if the process exited on its own.
    pub fn exit_code(&self) -> Option<i32> {
        self.outcome.code()
    }

    pub fn timed_out(&self) -> bool {
        self.outcome.is_timeout()
    }

    pub fn stdout(&self) -> &str {
        &self.stdout
    }

    /// Error output, annotated with hints when the process failed.
    pub fn stderr(&self) -> &str {
        &self.stderr
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn command_line(&self) -> &str {
        &self.command_line
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// The timeout that applied to this run.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Converts an unsuccessful result into an error.
    pub fn into_checked(self) -> Result<Self, ExecutorError> {
        match self.outcome {
            ExitOutcome::Exited(0) => Ok(self),
            ExitOutcome::TimedOut => Err(ExecutorError::Timeout {
                command: self.command_line,
                timeout_secs: self.timeout.as_secs(),
            }),
            other => Err(ExecutorError::ProcessFailed {
                command: self.command_line,
                status: other.to_string(),
                exit_code: other.code(),
                stderr: self.stderr,
            }),
        }
    }
}
