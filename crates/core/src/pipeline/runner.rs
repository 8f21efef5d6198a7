//! The conversion job driver.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::fs;
use tracing::{debug, error, info, warn};

use super::config::{PipelineConfig, QUALITY_RANGE_KBPS};
use super::error::PipelineError;
use super::metadata::{parse_metadata, METADATA_ARGS};
use super::naming::{output_file_name, place_file, unique_destination};
use super::parse::{parse_download_percent, parse_out_time_secs, position_percent, LineSplitter};
use super::reference::validate_reference;
use super::reporter::ItemReporter;
use super::types::{AudioFormat, ConversionItem, ConversionRequest, ItemOutcome, ItemStatus, JobResult};
use crate::config::Config;
use crate::executor::{is_writable_dir, CommandRunner, ExecutionRequest, OutputSink, ProcessExecutor};
use crate::metrics;
use crate::platform::{canonical_name, BinaryDescriptor, BinaryResolver, Platform};
use crate::progress::{validate_id, ProgressTracker, MAX_ID_LEN};

/// Logical names of the two binaries a job needs.
pub const DOWNLOADER: &str = "downloader";
pub const TRANSCODER: &str = "transcoder";

/// Where finished and in-flight artifacts go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineDirs {
    pub output_dir: PathBuf,
    pub temp_dir: PathBuf,
}

struct Binaries {
    downloader: BinaryDescriptor,
    transcoder: BinaryDescriptor,
}

/// Turns a source reference into audio files, one item at a time.
///
/// Input validation, directory checks and binary resolution happen before
/// any item is attempted, and failures there abort the job. After that,
/// each item's failure is recorded and the next item is attempted, unless
/// the failure means the remaining items cannot succeed either (the output
/// directory went away, a binary vanished), in which case the rest are
/// marked cancelled.
pub struct ConversionPipeline {
    resolver: BinaryResolver,
    runner: Arc<dyn CommandRunner>,
    tracker: Arc<ProgressTracker>,
    config: PipelineConfig,
    dirs: PipelineDirs,
    downloader_path: Option<PathBuf>,
    transcoder_path: Option<PathBuf>,
    in_flight: AtomicBool,
    process_names: Mutex<Vec<String>>,
}

impl ConversionPipeline {
    pub fn new(
        resolver: BinaryResolver,
        runner: Arc<dyn CommandRunner>,
        tracker: Arc<ProgressTracker>,
        config: PipelineConfig,
        dirs: PipelineDirs,
    ) -> Self {
        let process_names = [DOWNLOADER, TRANSCODER]
            .iter()
            .map(|n| canonical_name(n).to_string())
            .collect();
        Self {
            resolver,
            runner,
            tracker,
            config,
            dirs,
            downloader_path: None,
            transcoder_path: None,
            in_flight: AtomicBool::new(false),
            process_names: Mutex::new(process_names),
        }
    }

    /// Wires a pipeline from configuration with a real process executor.
    pub fn from_config(config: &Config, platform: Arc<Platform>) -> Result<Self, PipelineError> {
        let root = platform.project_root().to_path_buf();
        let tracker =
            ProgressTracker::from_config(&config.progress, &config.paths.progress_dir(&root))?;
        let runner = Arc::new(ProcessExecutor::new(platform.clone(), config.executor.clone()));
        let dirs = PipelineDirs {
            output_dir: config.paths.output_dir(&root),
            temp_dir: config.paths.temp_dir(&root),
        };

        Ok(Self::new(
            BinaryResolver::new(platform),
            runner,
            Arc::new(tracker),
            config.pipeline.clone(),
            dirs,
        )
        .with_binaries(
            config.binaries.downloader.clone(),
            config.binaries.transcoder.clone(),
        ))
    }

    /// Custom paths for the downloader and transcoder.
    pub fn with_binaries(mut self, downloader: Option<PathBuf>, transcoder: Option<PathBuf>) -> Self {
        self.downloader_path = downloader;
        self.transcoder_path = transcoder;
        self
    }

    pub fn tracker(&self) -> &Arc<ProgressTracker> {
        &self.tracker
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn dirs(&self) -> &PipelineDirs {
        &self.dirs
    }

    /// Runs one job to completion.
    ///
    /// `Err` means the job was rejected before any item was attempted. Item
    /// failures are reported in the returned [`JobResult`].
    pub async fn process_source(
        &self,
        request: ConversionRequest,
    ) -> Result<JobResult, PipelineError> {
        let result = self.run_job(request).await;
        if let Err(e) = &result {
            error!("Job rejected: {}", e);
            metrics::JOBS_ABORTED
                .with_label_values(&["rejected", e.kind().as_str()])
                .inc();
        }
        result
    }

    async fn run_job(&self, request: ConversionRequest) -> Result<JobResult, PipelineError> {
        let url = validate_reference(&request.reference, &self.config.allowed_hosts)?;
        let format = request.format.unwrap_or(self.config.default_format);
        let quality = self.quality_for(format, request.quality_kbps)?;
        let job_id = job_id(request.job_id)?;

        ensure_writable_dir(&self.dirs.output_dir).await?;
        ensure_writable_dir(&self.dirs.temp_dir).await?;

        let binaries = self.resolve_binaries()?;

        info!("Starting job {} for {}", job_id, url);
        let metadata = self
            .runner
            .run(
                ExecutionRequest::new(binaries.downloader.path())
                    .args(METADATA_ARGS.iter().copied())
                    .arg(url.as_str())
                    .working_dir(&self.dirs.temp_dir)
                    .timeout_secs(self.config.metadata_timeout_secs),
                None,
            )
            .await?
            .into_checked()?;
        let source = parse_metadata(metadata.stdout(), &url, self.config.max_items)?;

        let items: Vec<ConversionItem> = source
            .entries
            .into_iter()
            .enumerate()
            .map(|(idx, entry)| ConversionItem {
                id: if source.is_collection {
                    format!("{}-{}", job_id, idx + 1)
                } else {
                    job_id.clone()
                },
                index: idx + 1,
                title: entry.title,
                source_url: entry.url,
                duration_secs: entry.duration_secs,
                format,
                quality_kbps: quality,
            })
            .collect();
        let total = items.len();
        info!(
            "Job {}: '{}' has {} item(s), converting to {}",
            job_id, source.title, total, format
        );

        let job_temp = self.dirs.temp_dir.join(&job_id);
        let mut results = Vec::with_capacity(total);
        let mut abort_reason: Option<String> = None;

        self.in_flight.store(true, Ordering::SeqCst);
        for item in &items {
            let mut reporter = ItemReporter::new(self.tracker.clone(), &item.id);

            if let Some(reason) = &abort_reason {
                reporter.cancelled(reason);
                results.push(ItemOutcome::failed(item, ItemStatus::Cancelled, reason.clone(), None));
                continue;
            }

            info!("Item {}/{}: {}", item.index, total, item.title);
            match self.process_item(item, &mut reporter, &binaries, &job_temp).await {
                Ok(path) => {
                    reporter.completed(&path);
                    info!("Item {} saved to {:?}", item.id, path);
                    results.push(ItemOutcome::completed(item, path));
                }
                Err(e) => {
                    let message = describe(&e);
                    reporter.error(&message);
                    warn!("Item {} failed: {}", item.id, e);
                    if e.is_fatal() {
                        error!("Aborting job {} after item {}: {}", job_id, item.id, e);
                        metrics::JOBS_ABORTED
                            .with_label_values(&["mid_job", e.kind().as_str()])
                            .inc();
                        abort_reason = Some(format!("Cancelled: job aborted ({})", e));
                    }
                    results.push(ItemOutcome::failed(item, ItemStatus::Error, message, Some(e.kind())));
                }
            }
        }
        self.in_flight.store(false, Ordering::SeqCst);

        remove_dir_quietly(&job_temp).await;
        if let Err(e) = self.tracker.flush() {
            warn!("Failed to flush progress for job {}: {}", job_id, e);
        }

        let result = JobResult::new(job_id, total, results);
        info!(
            "Job {} finished: {} succeeded, {} failed, {} total",
            result.job_id,
            result.succeeded(),
            result.failed(),
            result.total
        );
        Ok(result)
    }

    fn quality_for(&self, format: AudioFormat, requested: Option<u32>) -> Result<Option<u32>, PipelineError> {
        if format.is_lossless() {
            if requested.is_some() {
                debug!("Ignoring quality for lossless format {}", format);
            }
            return Ok(None);
        }
        let kbps = requested.unwrap_or(self.config.default_quality_kbps);
        if !QUALITY_RANGE_KBPS.contains(&kbps) {
            return Err(PipelineError::invalid_request(format!(
                "quality {} kbps is outside {}-{} kbps",
                kbps,
                QUALITY_RANGE_KBPS.start(),
                QUALITY_RANGE_KBPS.end()
            )));
        }
        Ok(Some(kbps))
    }

    fn resolve_binaries(&self) -> Result<Binaries, PipelineError> {
        let downloader = self
            .resolver
            .resolve(DOWNLOADER, self.downloader_path.as_deref())?;
        let transcoder = self
            .resolver
            .resolve(TRANSCODER, self.transcoder_path.as_deref())?;
        debug!(
            "Using downloader {:?} ({:?}) and transcoder {:?} ({:?})",
            downloader.path(),
            downloader.location(),
            transcoder.path(),
            transcoder.location()
        );

        let mut names = self.process_names.lock().unwrap_or_else(|e| e.into_inner());
        for descriptor in [&downloader, &transcoder] {
            if let Some(name) = descriptor.path().file_name() {
                let name = name.to_string_lossy().to_string();
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }

        Ok(Binaries {
            downloader,
            transcoder,
        })
    }

    /// Runs one item in its own temporary directory, which is removed
    /// afterwards whatever the outcome.
    async fn process_item(
        &self,
        item: &ConversionItem,
        reporter: &mut ItemReporter,
        binaries: &Binaries,
        job_temp: &Path,
    ) -> Result<PathBuf, PipelineError> {
        let work_dir = job_temp.join(&item.id);
        fs::create_dir_all(&work_dir)
            .await
            .map_err(|e| PipelineError::directory_unavailable(&work_dir, e))?;

        let result = self.convert_item(item, reporter, binaries, &work_dir).await;
        remove_dir_quietly(&work_dir).await;
        result
    }

    async fn convert_item(
        &self,
        item: &ConversionItem,
        reporter: &mut ItemReporter,
        binaries: &Binaries,
        work_dir: &Path,
    ) -> Result<PathBuf, PipelineError> {
        reporter.starting(&format!("Starting: {}", item.title));

        let source = self.download(item, reporter, &binaries.downloader, work_dir).await?;
        let converted = self
            .transcode(item, reporter, &binaries.transcoder, &source, work_dir)
            .await?;

        let file_name = output_file_name(&item.title, &item.source_url, item.format);
        let destination = unique_destination(&self.dirs.output_dir, &file_name);
        place_file(&converted, &destination).await?;
        Ok(destination)
    }

    async fn download(
        &self,
        item: &ConversionItem,
        reporter: &mut ItemReporter,
        downloader: &BinaryDescriptor,
        work_dir: &Path,
    ) -> Result<PathBuf, PipelineError> {
        let template = work_dir.join("source.%(ext)s");
        let request = ExecutionRequest::new(downloader.path())
            .args(["-f", "bestaudio/best", "--no-playlist", "--newline", "--no-part", "-o"])
            .arg(template.to_string_lossy())
            .arg(item.source_url.as_str())
            .working_dir(work_dir)
            .timeout_secs(self.config.download_timeout_secs);

        reporter.downloading(0.0);
        let mut lines = LineSplitter::default();
        let mut on_output = |chunk: &str| -> anyhow::Result<()> {
            for line in lines.push(chunk) {
                if let Some(pct) = parse_download_percent(&line) {
                    reporter.downloading(pct);
                }
            }
            Ok(())
        };
        let sink: &mut dyn OutputSink = &mut on_output;
        self.runner.run(request, Some(sink)).await?.into_checked()?;

        find_downloaded(work_dir).await
    }

    async fn transcode(
        &self,
        item: &ConversionItem,
        reporter: &mut ItemReporter,
        transcoder: &BinaryDescriptor,
        source: &Path,
        work_dir: &Path,
    ) -> Result<PathBuf, PipelineError> {
        let output = work_dir.join(format!("output.{}", item.format.extension()));

        let mut args: Vec<String> = vec![
            "-y".into(),
            "-i".into(),
            source.to_string_lossy().to_string(),
            "-vn".into(),
            "-c:a".into(),
            item.format.codec().into(),
        ];
        if let Some(kbps) = item.quality_kbps {
            args.push("-b:a".into());
            args.push(format!("{}k", kbps));
        }
        args.extend(
            ["-progress", "pipe:1", "-nostats", "-loglevel", "error"]
                .iter()
                .map(|s| s.to_string()),
        );
        args.push(output.to_string_lossy().to_string());

        let request = ExecutionRequest::new(transcoder.path())
            .args(args)
            .working_dir(work_dir)
            .timeout_secs(self.config.transcode_timeout_secs);

        reporter.converting(0.0);
        let duration = item.duration_secs;
        let mut lines = LineSplitter::default();
        let mut on_output = |chunk: &str| -> anyhow::Result<()> {
            for line in lines.push(chunk) {
                let pct = parse_out_time_secs(&line)
                    .zip(duration)
                    .and_then(|(pos, total)| position_percent(pos, total));
                if let Some(pct) = pct {
                    reporter.converting(pct);
                }
            }
            Ok(())
        };
        let sink: &mut dyn OutputSink = &mut on_output;
        self.runner.run(request, Some(sink)).await?.into_checked()?;

        match fs::metadata(&output).await {
            Ok(meta) if meta.len() > 0 => {
                reporter.converting(100.0);
                Ok(output)
            }
            _ => Err(PipelineError::OutputMissing { path: output }),
        }
    }

    /// Forcibly terminates known binaries if an item is still in flight.
    ///
    /// Called on drop; a job future dropped mid-item otherwise leaves its
    /// children running.
    pub fn teardown(&self) {
        if !self.in_flight.swap(false, Ordering::SeqCst) {
            return;
        }
        let names = self
            .process_names
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        warn!(
            "Pipeline torn down mid-item, terminating {}",
            names.join(", ")
        );
        let names: Vec<&str> = names.iter().map(String::as_str).collect();
        self.runner.terminate_processes(&names);
    }
}

impl Drop for ConversionPipeline {
    fn drop(&mut self) {
        self.teardown();
    }
}

fn job_id(requested: Option<String>) -> Result<String, PipelineError> {
    let Some(id) = requested else {
        return Ok(uuid::Uuid::new_v4().simple().to_string());
    };
    validate_id(&id).map_err(|e| PipelineError::invalid_request(e.to_string()))?;
    // Leaves room for the "-<n>" suffix of collection items.
    if id.len() > MAX_ID_LEN - 8 {
        return Err(PipelineError::invalid_request(format!(
            "job id must be at most {} characters",
            MAX_ID_LEN - 8
        )));
    }
    Ok(id)
}

fn describe(e: &PipelineError) -> String {
    match e.remediation() {
        Some(hint) => format!("{}\nHint: {}", e, hint),
        None => e.to_string(),
    }
}

async fn ensure_writable_dir(dir: &Path) -> Result<(), PipelineError> {
    fs::create_dir_all(dir)
        .await
        .map_err(|e| PipelineError::directory_unavailable(dir, e))?;
    if !is_writable_dir(dir) {
        return Err(PipelineError::directory_unavailable(
            dir,
            "directory is not writable",
        ));
    }
    Ok(())
}

/// The downloaded file is `source.<ext>`, with an extension only the
/// downloader knows.
async fn find_downloaded(work_dir: &Path) -> Result<PathBuf, PipelineError> {
    let mut entries = fs::read_dir(work_dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().to_string();
        if !name.starts_with("source.") || name.ends_with(".part") || name.ends_with(".ytdl") {
            continue;
        }
        if entry.metadata().await.map(|m| m.is_file() && m.len() > 0).unwrap_or(false) {
            return Ok(entry.path());
        }
    }
    Err(PipelineError::OutputMissing {
        path: work_dir.join("source.*"),
    })
}

async fn remove_dir_quietly(dir: &Path) {
    match fs::remove_dir_all(dir).await {
        Ok(()) => debug!("Removed {:?}", dir),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove temporary directory {:?}: {}", dir, e),
    }
}
