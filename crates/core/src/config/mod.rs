mod loader;
mod types;
mod validate;

pub use loader::{load_config, load_config_from_env, load_config_from_str};
pub use types::*;
pub use validate::validate_config;

use thiserror::Error;

use crate::error::ErrorKind;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl ConfigError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Configuration
    }

    pub fn remediation(&self) -> Option<&str> {
        match self {
            Self::FileNotFound(_) => Some("Pass an existing file with --config, or omit it to use defaults"),
            Self::ParseError(_) | Self::ValidationError(_) => {
                Some("Fix the value named above in the config file or AUDIOGRAB_* environment")
            }
        }
    }
}
