pub mod config;
pub mod error;
pub mod executor;
pub mod metrics;
pub mod pipeline;
pub mod platform;
pub mod progress;
pub mod testing;

pub use config::{
    load_config, load_config_from_env, load_config_from_str, validate_config, Config, ConfigError,
};
pub use error::ErrorKind;
pub use executor::{CommandRunner, ExecutionRequest, ExecutionResult, ExecutorError, ProcessExecutor};
pub use pipeline::{
    AudioFormat, ConversionPipeline, ConversionRequest, ItemOutcome, ItemStatus, JobResult,
    PipelineError,
};
pub use platform::{BinaryDescriptor, BinaryResolver, Platform, ResolveError};
pub use progress::{ProgressRecord, ProgressStore, ProgressTracker, Stage};
