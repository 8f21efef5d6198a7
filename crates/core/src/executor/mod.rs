//! Supervised execution of external binaries.
//!
//! [`ProcessExecutor`] runs a resolved binary with a timeout, forwards its
//! standard output to an optional [`OutputSink`] as it arrives, normalizes
//! the child environment where the platform needs it, and annotates
//! failure output with actionable hints.
//!
//! # Example
//!
//! ```ignore
//! use audiograb_core::executor::{CommandRunner, ExecutionRequest, ProcessExecutor};
//! use audiograb_core::platform::Platform;
//!
//! let executor = ProcessExecutor::with_defaults(Platform::current());
//! let mut sink = |chunk: &str| -> anyhow::Result<()> {
//!     print!("{}", chunk);
//!     Ok(())
//! };
//! let result = executor
//!     .run(
//!         ExecutionRequest::new("/usr/bin/ffmpeg").arg("-version").timeout_secs(10),
//!         Some(&mut sink),
//!     )
//!     .await?
//!     .into_checked()?;
//! ```

mod config;
mod environment;
mod error;
mod hints;
mod runner;
mod sink;
mod types;

pub use config::ExecutorConfig;
pub use environment::{select_temp_dir, EnvironmentMode, EnvironmentPlan};
pub(crate) use environment::is_writable_dir;
pub use error::ExecutorError;
pub use hints::annotate_stderr;
pub use runner::{terminate_by_name, CommandRunner, ProcessExecutor};
pub use sink::OutputSink;
pub use types::{ExecutionRequest, ExecutionResult, ExitOutcome};
