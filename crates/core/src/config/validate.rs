use super::{types::Config, ConfigError};
use crate::pipeline::QUALITY_RANGE_KBPS;
use crate::progress::MAX_TTL_SECS;

/// Validate configuration
/// Currently validates:
/// - Timeouts are not 0
/// - Progress throttle interval is not 0
/// - Memory-backend TTL between 1 second and one year
/// - At least one allowed host
/// - Default quality within the supported bitrate range
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let timeouts = [
        ("executor.default_timeout_secs", config.executor.default_timeout_secs),
        ("pipeline.metadata_timeout_secs", config.pipeline.metadata_timeout_secs),
        ("pipeline.download_timeout_secs", config.pipeline.download_timeout_secs),
        ("pipeline.transcode_timeout_secs", config.pipeline.transcode_timeout_secs),
    ];
    for (key, value) in timeouts {
        if value == 0 {
            return Err(ConfigError::ValidationError(format!("{} cannot be 0", key)));
        }
    }

    if config.progress.throttle_ms == 0 {
        return Err(ConfigError::ValidationError(
            "progress.throttle_ms cannot be 0".to_string(),
        ));
    }

    if config.progress.ttl_secs == 0 || config.progress.ttl_secs > MAX_TTL_SECS {
        return Err(ConfigError::ValidationError(format!(
            "progress.ttl_secs must be between 1 and {}",
            MAX_TTL_SECS
        )));
    }

    if config.pipeline.allowed_hosts.iter().all(|h| h.trim().is_empty()) {
        return Err(ConfigError::ValidationError(
            "pipeline.allowed_hosts must name at least one host".to_string(),
        ));
    }

    if config.pipeline.max_items == 0 {
        return Err(ConfigError::ValidationError(
            "pipeline.max_items cannot be 0".to_string(),
        ));
    }

    if !QUALITY_RANGE_KBPS.contains(&config.pipeline.default_quality_kbps) {
        return Err(ConfigError::ValidationError(format!(
            "pipeline.default_quality_kbps must be between {} and {}",
            QUALITY_RANGE_KBPS.start(),
            QUALITY_RANGE_KBPS.end()
        )));
    }

    Ok(())
}
