//! Configuration for the conversion pipeline.

use serde::{Deserialize, Serialize};

use super::types::AudioFormat;

/// Configuration for [`ConversionPipeline`](super::ConversionPipeline).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PipelineConfig {
    /// Timeout for the metadata lookup, in seconds.
    #[serde(default = "default_metadata_timeout")]
    pub metadata_timeout_secs: u64,

    /// Timeout for one item download, in seconds.
    #[serde(default = "default_download_timeout")]
    pub download_timeout_secs: u64,

    /// Timeout for one item transcode, in seconds.
    #[serde(default = "default_transcode_timeout")]
    pub transcode_timeout_secs: u64,

    #[serde(default)]
    pub default_format: AudioFormat,

    /// Bitrate for lossy formats when a request does not specify one.
    #[serde(default = "default_quality")]
    pub default_quality_kbps: u32,

    /// Hosts (and their subdomains) accepted as source references.
    #[serde(default = "default_allowed_hosts")]
    pub allowed_hosts: Vec<String>,

    /// Maximum number of playlist entries processed per job.
    #[serde(default = "default_max_items")]
    pub max_items: usize,
}

fn default_metadata_timeout() -> u64 {
    60
}

fn default_download_timeout() -> u64 {
    1800
}

fn default_transcode_timeout() -> u64 {
    1800
}

fn default_quality() -> u32 {
    192
}

fn default_allowed_hosts() -> Vec<String> {
    vec![
        "youtube.com".to_string(),
        "youtu.be".to_string(),
        "youtube-nocookie.com".to_string(),
    ]
}

fn default_max_items() -> usize {
    100
}

/// Accepted range for lossy bitrates, in kbps.
pub const QUALITY_RANGE_KBPS: std::ops::RangeInclusive<u32> = 32..=512;

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            metadata_timeout_secs: default_metadata_timeout(),
            download_timeout_secs: default_download_timeout(),
            transcode_timeout_secs: default_transcode_timeout(),
            default_format: AudioFormat::default(),
            default_quality_kbps: default_quality(),
            allowed_hosts: default_allowed_hosts(),
            max_items: default_max_items(),
        }
    }
}

impl PipelineConfig {
    pub fn with_allowed_hosts<I, S>(mut self, hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_hosts = hosts.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_max_items(mut self, max_items: usize) -> Self {
        self.max_items = max_items;
        self
    }

    pub fn with_default_format(mut self, format: AudioFormat) -> Self {
        self.default_format = format;
        self
    }
}
