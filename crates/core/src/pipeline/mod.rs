//! The conversion pipeline.
//!
//! A [`ConversionPipeline`] validates a source reference, asks the
//! downloader what it expands to, and then downloads and transcodes each
//! item in turn, reporting `starting`, `downloading`, `converting` and a
//! terminal stage for every item through the [`ProgressTracker`].
//!
//! [`ProgressTracker`]: crate::progress::ProgressTracker

mod config;
mod error;
mod metadata;
mod naming;
mod parse;
mod reference;
mod reporter;
mod runner;
mod types;

pub use config::{PipelineConfig, QUALITY_RANGE_KBPS};
pub use error::PipelineError;
pub use metadata::{parse_metadata, SourceEntry, SourceMetadata, METADATA_ARGS};
pub use naming::{output_file_name, place_file, sanitize_title, source_hash, unique_destination};
pub use parse::{parse_download_percent, parse_out_time_secs, position_percent};
pub use reference::validate_reference;
pub use reporter::ItemReporter;
pub use runner::{ConversionPipeline, PipelineDirs, DOWNLOADER, TRANSCODER};
pub use types::{
    AudioFormat, ConversionItem, ConversionRequest, ItemOutcome, ItemStatus, JobResult,
};
