//! Configuration for the process executor.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::environment::EnvironmentMode;

/// Configuration for [`ProcessExecutor`](super::ProcessExecutor).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExecutorConfig {
    /// Timeout applied when a request does not carry its own, in seconds.
    #[serde(default = "default_timeout")]
    pub default_timeout_secs: u64,

    /// Working directory used when a request does not carry its own.
    /// Defaults to the project root.
    #[serde(default)]
    pub working_dir: Option<PathBuf>,

    /// When to normalize the child environment.
    #[serde(default)]
    pub environment: EnvironmentMode,
}

fn default_timeout() -> u64 {
    600
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            default_timeout_secs: default_timeout(),
            working_dir: None,
            environment: EnvironmentMode::default(),
        }
    }
}

impl ExecutorConfig {
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.default_timeout_secs = secs;
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn with_environment(mut self, mode: EnvironmentMode) -> Self {
        self.environment = mode;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_toml() {
        let config: ExecutorConfig = toml::from_str("").unwrap();
        assert_eq!(config, ExecutorConfig::default());
        assert_eq!(config.default_timeout_secs, 600);
        assert_eq!(config.environment, EnvironmentMode::Auto);
    }

    #[test]
    fn test_environment_mode_parsing() {
        let config: ExecutorConfig = toml::from_str(r#"environment = "never""#).unwrap();
        assert_eq!(config.environment, EnvironmentMode::Never);
    }
}
