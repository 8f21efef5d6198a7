//! Process execution with timeout, streaming and environment normalization.

use async_trait::async_trait;
use once_cell::sync::OnceCell;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::config::ExecutorConfig;
use super::environment::EnvironmentPlan;
use super::error::ExecutorError;
use super::hints::annotate_stderr;
use super::sink::{GuardedSink, OutputSink, Utf8Chunker};
use super::types::{ExecutionRequest, ExecutionResult, ExitOutcome};
use crate::metrics;
use crate::platform::{OsFamily, Platform};

/// How long to keep draining stderr after a timed-out process was killed.
const STDERR_GRACE: Duration = Duration::from_millis(500);

const READ_BUFFER_SIZE: usize = 8 * 1024;

/// Runs external commands. The seam the pipeline depends on.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Runs a command to completion or timeout.
    ///
    /// Returns `Err` only when the process could not be launched or
    /// supervised; a process that ran and failed (or timed out) is an
    /// `Ok` result with an unsuccessful [`ExitOutcome`].
    async fn run(
        &self,
        request: ExecutionRequest,
        sink: Option<&mut dyn OutputSink>,
    ) -> Result<ExecutionResult, ExecutorError>;

    /// Forcibly terminates every process with one of the given image names.
    fn terminate_processes(&self, names: &[&str]);
}

/// [`CommandRunner`] backed by real child processes.
pub struct ProcessExecutor {
    platform: Arc<Platform>,
    config: ExecutorConfig,
    environment: OnceCell<Option<EnvironmentPlan>>,
}

impl ProcessExecutor {
    pub fn new(platform: Arc<Platform>, config: ExecutorConfig) -> Self {
        Self {
            platform,
            config,
            environment: OnceCell::new(),
        }
    }

    /// Creates an executor with default configuration.
    pub fn with_defaults(platform: Arc<Platform>) -> Self {
        Self::new(platform, ExecutorConfig::default())
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// The environment plan, computed on first use.
    pub fn environment_plan(&self) -> Result<Option<&EnvironmentPlan>, ExecutorError> {
        self.environment
            .get_or_try_init(|| EnvironmentPlan::for_platform(&self.platform, self.config.environment))
            .map(Option::as_ref)
    }

    fn default_working_dir(&self) -> PathBuf {
        match &self.config.working_dir {
            Some(dir) if dir.is_absolute() => dir.clone(),
            Some(dir) => self.platform.project_root().join(dir),
            None => self.platform.project_root().to_path_buf(),
        }
    }

    async fn execute(
        &self,
        request: ExecutionRequest,
        sink: Option<&mut dyn OutputSink>,
    ) -> Result<ExecutionResult, ExecutorError> {
        let working_dir = request
            .requested_working_dir()
            .map(PathBuf::from)
            .unwrap_or_else(|| self.default_working_dir());
        if !working_dir.is_dir() {
            return Err(ExecutorError::WorkingDirUnavailable { path: working_dir });
        }

        let limit = request
            .requested_timeout()
            .unwrap_or_else(|| Duration::from_secs(self.config.default_timeout_secs));
        let command_line = request.command_line();
        let binary = request.binary_name();

        let mut cmd = Command::new(request.program());
        cmd.args(request.arguments())
            .current_dir(&working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(plan) = self.environment_plan()? {
            plan.apply(&mut cmd);
        }

        debug!("Running {} in {:?}", command_line, working_dir);
        let started = Instant::now();

        let mut child = cmd.spawn().map_err(|e| {
            metrics::PROCESS_EXECUTIONS
                .with_label_values(&[binary.as_str(), "spawn_error"])
                .inc();
            ExecutorError::spawn(request.program(), e)
        })?;

        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| std::io::Error::other("stdout was not captured"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| std::io::Error::other("stderr was not captured"))?;

        let stderr_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            let _ = stderr.read_to_end(&mut buf).await;
            buf
        });

        let mut guard = GuardedSink::new(sink, binary.clone());
        let mut captured = String::new();

        let run = async {
            let mut chunker = Utf8Chunker::default();
            let mut buf = vec![0u8; READ_BUFFER_SIZE];
            loop {
                let n = stdout.read(&mut buf).await?;
                if n == 0 {
                    break;
                }
                let text = chunker.push(&buf[..n]);
                if !text.is_empty() {
                    guard.deliver(&text);
                    captured.push_str(&text);
                }
            }
            let tail = chunker.finish();
            if !tail.is_empty() {
                guard.deliver(&tail);
                captured.push_str(&tail);
            }
            child.wait().await
        };

        let outcome = match timeout(limit, run).await {
            Ok(Ok(status)) => match status.code() {
                Some(code) => ExitOutcome::Exited(code),
                None => ExitOutcome::Signaled,
            },
            Ok(Err(e)) => {
                let _ = child.kill().await;
                return Err(ExecutorError::Io(e));
            }
            Err(_) => {
                warn!(
                    "{} exceeded its {} second timeout, killing it",
                    binary,
                    limit.as_secs()
                );
                let _ = child.kill().await;
                ExitOutcome::TimedOut
            }
        };
        let duration = started.elapsed();

        let stderr_bytes = match outcome {
            ExitOutcome::TimedOut => timeout(STDERR_GRACE, stderr_task)
                .await
                .ok()
                .and_then(Result::ok)
                .unwrap_or_default(),
            _ => stderr_task.await.unwrap_or_default(),
        };
        let raw_stderr = String::from_utf8_lossy(&stderr_bytes).to_string();

        let stderr = match outcome {
            ExitOutcome::Exited(0) => raw_stderr,
            ExitOutcome::TimedOut => {
                let mut text = annotate_stderr(&raw_stderr);
                if !text.is_empty() && !text.ends_with('\n') {
                    text.push('\n');
                }
                text.push_str(&format!(
                    "Process timed out after {} seconds and was terminated",
                    limit.as_secs()
                ));
                text
            }
            _ => annotate_stderr(&raw_stderr),
        };

        metrics::PROCESS_EXECUTIONS
            .with_label_values(&[binary.as_str(), outcome.label()])
            .inc();
        metrics::PROCESS_DURATION
            .with_label_values(&[binary.as_str()])
            .observe(duration.as_secs_f64());

        if outcome.success() {
            debug!("{} finished in {:?}", binary, duration);
        } else {
            info!("{} finished with {} after {:?}", binary, outcome, duration);
        }

        Ok(ExecutionResult::new(
            outcome,
            captured,
            stderr,
            duration,
            command_line,
            working_dir,
            limit,
        ))
    }
}

#[async_trait]
impl CommandRunner for ProcessExecutor {
    async fn run(
        &self,
        request: ExecutionRequest,
        sink: Option<&mut dyn OutputSink>,
    ) -> Result<ExecutionResult, ExecutorError> {
        self.execute(request, sink).await
    }

    fn terminate_processes(&self, names: &[&str]) {
        terminate_by_name(self.platform.os(), names);
    }
}

/// Forcibly kills every process whose image name matches one of `names`.
///
/// Uses `taskkill /F /IM` on Windows and `pkill -x` elsewhere. Returns the
/// number of names for which the kill command reported a match.
pub fn terminate_by_name(os: OsFamily, names: &[&str]) -> usize {
    let mut killed = 0;
    for name in names {
        let status = if os.is_windows() {
            let image = if name.to_ascii_lowercase().ends_with(".exe") {
                name.to_string()
            } else {
                format!("{}.exe", name)
            };
            std::process::Command::new("taskkill")
                .args(["/F", "/IM", image.as_str()])
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
        } else {
            std::process::Command::new("pkill")
                .args(["-x", name])
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
        };

        match status {
            Ok(status) if status.success() => {
                warn!("Terminated leftover {} processes", name);
                killed += 1;
            }
            Ok(_) => debug!("No {} processes to terminate", name),
            Err(e) => debug!("Could not run process killer for {}: {}", name, e),
        }
    }
    killed
}
