//! Types for the conversion pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::ErrorKind;
use crate::progress::Stage;

/// Target audio format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioFormat {
    /// MPEG Audio Layer III
    #[default]
    Mp3,
    /// Advanced Audio Coding in an MP4 container
    #[serde(alias = "m4a")]
    Aac,
    /// Opus
    Opus,
    /// Ogg Vorbis
    #[serde(alias = "ogg")]
    Vorbis,
    /// Free Lossless Audio Codec (lossless)
    Flac,
    /// WAVE (uncompressed)
    Wav,
}

impl AudioFormat {
    /// Returns the file extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
            Self::Aac => "m4a",
            Self::Opus => "opus",
            Self::Vorbis => "ogg",
            Self::Flac => "flac",
            Self::Wav => "wav",
        }
    }

    /// Returns the transcoder codec name for this format.
    pub fn codec(&self) -> &'static str {
        match self {
            Self::Mp3 => "libmp3lame",
            Self::Aac => "aac",
            Self::Opus => "libopus",
            Self::Vorbis => "libvorbis",
            Self::Flac => "flac",
            Self::Wav => "pcm_s16le",
        }
    }

    /// Whether this format is lossless (bitrate does not apply).
    pub fn is_lossless(&self) -> bool {
        matches!(self, Self::Flac | Self::Wav)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
            Self::Aac => "aac",
            Self::Opus => "opus",
            Self::Vorbis => "vorbis",
            Self::Flac => "flac",
            Self::Wav => "wav",
        }
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AudioFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mp3" => Ok(Self::Mp3),
            "aac" | "m4a" => Ok(Self::Aac),
            "opus" => Ok(Self::Opus),
            "vorbis" | "ogg" => Ok(Self::Vorbis),
            "flac" => Ok(Self::Flac),
            "wav" => Ok(Self::Wav),
            other => Err(format!(
                "unsupported audio format '{}' (expected mp3, aac, opus, vorbis, flac or wav)",
                other
            )),
        }
    }
}

/// A request to convert one source reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionRequest {
    /// The media or playlist URL.
    pub reference: String,
    /// Target format; the configured default when absent.
    #[serde(default)]
    pub format: Option<AudioFormat>,
    /// Target bitrate for lossy formats; the configured default when absent.
    #[serde(default)]
    pub quality_kbps: Option<u32>,
    /// Progress id for the job; generated when absent.
    #[serde(default)]
    pub job_id: Option<String>,
}

impl ConversionRequest {
    pub fn new(reference: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            format: None,
            quality_kbps: None,
            job_id: None,
        }
    }

    pub fn with_format(mut self, format: AudioFormat) -> Self {
        self.format = Some(format);
        self
    }

    pub fn with_quality_kbps(mut self, kbps: u32) -> Self {
        self.quality_kbps = Some(kbps);
        self
    }

    pub fn with_job_id(mut self, job_id: impl Into<String>) -> Self {
        self.job_id = Some(job_id.into());
        self
    }
}

/// One unit of work within a job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversionItem {
    /// Progress id of this item.
    pub id: String,
    /// 1-based position within the job.
    pub index: usize,
    pub title: String,
    pub source_url: String,
    pub duration_secs: Option<f64>,
    pub format: AudioFormat,
    pub quality_kbps: Option<u32>,
}

/// Terminal status of an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Completed,
    Error,
    Cancelled,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Error => "error",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn stage(&self) -> Stage {
        match self {
            Self::Completed => Stage::Completed,
            Self::Error => Stage::Error,
            Self::Cancelled => Stage::Cancelled,
        }
    }
}

/// Outcome of one item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemOutcome {
    pub id: String,
    pub title: String,
    pub source_url: String,
    pub format: AudioFormat,
    pub status: ItemStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
}

impl ItemOutcome {
    pub(crate) fn completed(item: &ConversionItem, output_path: PathBuf) -> Self {
        Self {
            id: item.id.clone(),
            title: item.title.clone(),
            source_url: item.source_url.clone(),
            format: item.format,
            status: ItemStatus::Completed,
            output_path: Some(output_path),
            error: None,
            error_kind: None,
        }
    }

    pub(crate) fn failed(
        item: &ConversionItem,
        status: ItemStatus,
        message: impl Into<String>,
        kind: Option<ErrorKind>,
    ) -> Self {
        Self {
            id: item.id.clone(),
            title: item.title.clone(),
            source_url: item.source_url.clone(),
            format: item.format,
            status,
            output_path: None,
            error: Some(message.into()),
            error_kind: kind,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ItemStatus::Completed
    }
}

/// Aggregate result of one job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobResult {
    pub job_id: String,
    /// Number of items discovered.
    pub total: usize,
    /// Number of items that reached `completed` or `error`.
    pub processed: usize,
    pub results: Vec<ItemOutcome>,
}

impl JobResult {
    pub(crate) fn new(job_id: impl Into<String>, total: usize, results: Vec<ItemOutcome>) -> Self {
        let processed = results
            .iter()
            .filter(|r| matches!(r.status, ItemStatus::Completed | ItemStatus::Error))
            .count();
        Self {
            job_id: job_id.into(),
            total,
            processed,
            results,
        }
    }

    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.status == ItemStatus::Error)
            .count()
    }

    pub fn all_succeeded(&self) -> bool {
        self.total > 0 && self.succeeded() == self.total
    }
}
