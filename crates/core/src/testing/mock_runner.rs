//! Mock command runner for testing.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::executor::{
    CommandRunner, ExecutionRequest, ExecutionResult, ExecutorError, ExitOutcome, OutputSink,
};

/// What the mock should answer for one request.
#[derive(Debug, Clone, PartialEq)]
pub struct MockReply {
    pub outcome: ExitOutcome,
    pub stdout: String,
    pub stderr: String,
    /// Simulated run time before any output is delivered.
    pub delay: Option<Duration>,
}

impl MockReply {
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            outcome: ExitOutcome::Exited(0),
            stdout: stdout.into(),
            stderr: String::new(),
            delay: None,
        }
    }

    pub fn failure(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            outcome: ExitOutcome::Exited(code),
            stdout: String::new(),
            stderr: stderr.into(),
            delay: None,
        }
    }

    pub fn timeout() -> Self {
        Self {
            outcome: ExitOutcome::TimedOut,
            stdout: String::new(),
            stderr: "Process timed out and was terminated".to_string(),
            delay: None,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

/// Decides the reply for a request.
pub type MockHandler = Arc<dyn Fn(&ExecutionRequest) -> MockReply + Send + Sync>;

/// A request the mock received.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
    pub timeout: Option<Duration>,
}

impl RecordedCall {
    /// File stem of the program, e.g. `yt-dlp`.
    pub fn binary(&self) -> String {
        self.program
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    pub fn has_arg(&self, arg: &str) -> bool {
        self.args.iter().any(|a| a == arg)
    }
}

/// Mock implementation of the CommandRunner trait.
///
/// Provides controllable behavior for testing:
/// - Record every request for assertions
/// - Answer through a handler closure
/// - Stream stdout to the sink line by line, as a real process would
/// - Record forced terminations
///
/// # Example
///
/// ```rust,ignore
/// use audiograb_core::testing::{MockCommandRunner, MockReply};
///
/// let runner = MockCommandRunner::new(|req| {
///     if req.arguments().iter().any(|a| a == "--dump-single-json") {
///         MockReply::success(r#"{"id":"abc","title":"Song"}"#)
///     } else {
///         MockReply::failure(1, "ERROR: Video unavailable")
///     }
/// });
///
/// let calls = runner.calls();
/// ```
pub struct MockCommandRunner {
    handler: MockHandler,
    calls: Mutex<Vec<RecordedCall>>,
    terminated: Mutex<Vec<String>>,
}

impl Default for MockCommandRunner {
    fn default() -> Self {
        Self::new(|_| MockReply::success(""))
    }
}

impl MockCommandRunner {
    pub fn new(handler: impl Fn(&ExecutionRequest) -> MockReply + Send + Sync + 'static) -> Self {
        Self::with_handler(Arc::new(handler))
    }

    pub fn with_handler(handler: MockHandler) -> Self {
        Self {
            handler,
            calls: Mutex::new(Vec::new()),
            terminated: Mutex::new(Vec::new()),
        }
    }

    fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
        mutex.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Get all recorded calls.
    pub fn calls(&self) -> Vec<RecordedCall> {
        Self::lock(&self.calls).clone()
    }

    /// Get the number of calls made.
    pub fn call_count(&self) -> usize {
        Self::lock(&self.calls).len()
    }

    /// Calls whose program stem starts with `binary`.
    pub fn calls_to(&self, binary: &str) -> Vec<RecordedCall> {
        self.calls()
            .into_iter()
            .filter(|c| c.binary().starts_with(binary))
            .collect()
    }

    /// Process names passed to `terminate_processes`.
    pub fn terminated(&self) -> Vec<String> {
        Self::lock(&self.terminated).clone()
    }
}

#[async_trait]
impl CommandRunner for MockCommandRunner {
    async fn run(
        &self,
        request: ExecutionRequest,
        sink: Option<&mut dyn OutputSink>,
    ) -> Result<ExecutionResult, ExecutorError> {
        Self::lock(&self.calls).push(RecordedCall {
            program: request.program().to_path_buf(),
            args: request.arguments().to_vec(),
            working_dir: request.requested_working_dir().map(PathBuf::from),
            timeout: request.requested_timeout(),
        });

        let reply = (self.handler)(&request);
        let started = Instant::now();
        if let Some(delay) = reply.delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(sink) = sink {
            for line in reply.stdout.split_inclusive('\n') {
                let _ = sink.on_chunk(line);
            }
        }

        Ok(ExecutionResult::new(
            reply.outcome,
            reply.stdout,
            reply.stderr,
            started.elapsed(),
            request.command_line(),
            request
                .requested_working_dir()
                .map(PathBuf::from)
                .unwrap_or_default(),
            request.requested_timeout().unwrap_or_default(),
        ))
    }

    fn terminate_processes(&self, names: &[&str]) {
        Self::lock(&self.terminated).extend(names.iter().map(|n| n.to_string()));
    }
}
