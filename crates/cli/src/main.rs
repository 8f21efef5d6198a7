use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use audiograb_core::{
    load_config, load_config_from_env, validate_config, AudioFormat, Config, ConversionPipeline,
    ConversionRequest, Platform,
};

const EXIT_FATAL: i32 = 1;
const EXIT_USAGE: i32 = 2;
const EXIT_ITEMS_FAILED: i32 = 3;

#[derive(Debug, Parser, PartialEq)]
#[command(
    name = "audiograb",
    version,
    about = "Convert a video or playlist URL into local audio files"
)]
struct CliArgs {
    /// Configuration file (defaults to ./audiograb.toml when present)
    #[arg(short, long, env = "AUDIOGRAB_CONFIG")]
    config: Option<PathBuf>,

    /// Target format: mp3, aac/m4a, opus, vorbis/ogg, flac or wav
    #[arg(short, long, value_parser = parse_format)]
    format: Option<AudioFormat>,

    /// Bitrate in kbps for lossy formats
    #[arg(short, long = "quality")]
    quality_kbps: Option<u32>,

    /// Identifier for the job's progress records
    #[arg(long)]
    job_id: Option<String>,

    /// Write Prometheus metrics to this file after the job
    #[arg(long)]
    metrics_out: Option<PathBuf>,

    /// Video or playlist URL
    #[arg(value_name = "URL")]
    reference: String,
}

fn parse_format(raw: &str) -> Result<AudioFormat, String> {
    raw.parse()
}

#[tokio::main]
async fn main() {
    let args = match CliArgs::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            std::process::exit(if e.use_stderr() { EXIT_USAGE } else { 0 });
        }
    };

    init_logging();

    match run(args).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            error!("Fatal error: {:#}", e);
            eprintln!("Error: {:#}", e);
            std::process::exit(EXIT_FATAL);
        }
    }
}

fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    let json = std::env::var("AUDIOGRAB_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let layer = if json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .boxed()
    };

    tracing_subscriber::registry().with(filter).with(layer).init();
}

fn load(config_path: Option<&PathBuf>) -> Result<Config> {
    let config = match config_path {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            load_config(path).with_context(|| format!("Failed to load config from {:?}", path))?
        }
        None if PathBuf::from("audiograb.toml").exists() => {
            info!("Loading configuration from audiograb.toml");
            load_config(&PathBuf::from("audiograb.toml"))
                .context("Failed to load config from audiograb.toml")?
        }
        None => load_config_from_env().context("Failed to read AUDIOGRAB_* environment")?,
    };

    validate_config(&config).context("Configuration validation failed")?;
    Ok(config)
}

async fn run(args: CliArgs) -> Result<i32> {
    let config = load(args.config.as_ref())?;

    let platform = match &config.paths.project_root {
        Some(root) => Arc::new(Platform::current().with_project_root(root)),
        None => Platform::current(),
    };
    info!("Project root: {:?}", platform.project_root());

    let pipeline = ConversionPipeline::from_config(&config, platform)
        .map_err(|e| with_remediation(&e.to_string(), e.remediation()))?;

    let max_age = std::time::Duration::from_secs(config.progress.cleanup_max_age_secs);
    if let Err(e) = pipeline.tracker().cleanup(max_age) {
        warn!("Progress cleanup failed: {}", e);
    }

    let mut request = ConversionRequest::new(args.reference.clone());
    request.format = args.format;
    request.quality_kbps = args.quality_kbps;
    request.job_id = args.job_id.clone();

    let result = pipeline
        .process_source(request)
        .await
        .map_err(|e| with_remediation(&e.to_string(), e.remediation()))?;

    println!("{}", serde_json::to_string_pretty(&result)?);

    if let Some(path) = &args.metrics_out {
        std::fs::write(path, audiograb_core::metrics::gather_metrics())
            .with_context(|| format!("Failed to write metrics to {:?}", path))?;
    }

    if result.failed() > 0 || result.succeeded() < result.total {
        Ok(EXIT_ITEMS_FAILED)
    } else {
        Ok(0)
    }
}

fn with_remediation(message: &str, remediation: Option<&str>) -> anyhow::Error {
    match remediation {
        Some(hint) => anyhow::anyhow!("{}\nHint: {}", message, hint),
        None => anyhow::anyhow!("{}", message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn test_parse_args_full() {
        let parsed = CliArgs::try_parse_from([
            "audiograb",
            "--config",
            "a.toml",
            "-f",
            "m4a",
            "--quality",
            "256",
            "--job-id",
            "job1",
            "https://youtu.be/abc",
        ])
        .unwrap();
        assert_eq!(
            parsed,
            CliArgs {
                config: Some(PathBuf::from("a.toml")),
                format: Some(AudioFormat::Aac),
                quality_kbps: Some(256),
                job_id: Some("job1".to_string()),
                metrics_out: None,
                reference: "https://youtu.be/abc".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_args_errors() {
        let parse = |args: &[&str]| CliArgs::try_parse_from(args.iter().copied());

        assert_eq!(
            parse(&["audiograb"]).unwrap_err().kind(),
            ErrorKind::MissingRequiredArgument
        );
        assert_eq!(
            parse(&["audiograb", "--bogus", "https://youtu.be/a"]).unwrap_err().kind(),
            ErrorKind::UnknownArgument
        );
        assert!(parse(&["audiograb", "https://youtu.be/a", "--format"]).is_err());
        assert!(parse(&["audiograb", "--format", "mp4", "https://youtu.be/a"]).is_err());
        assert!(parse(&["audiograb", "--quality", "loud", "https://youtu.be/a"]).is_err());
        assert!(parse(&["audiograb", "https://youtu.be/a", "https://youtu.be/b"]).is_err());
    }

    #[test]
    fn test_cli_definition_is_consistent() {
        use clap::CommandFactory;
        CliArgs::command().debug_assert();
    }

    #[test]
    fn test_with_remediation() {
        let e = with_remediation("Directory unavailable", Some("Create it"));
        assert_eq!(e.to_string(), "Directory unavailable\nHint: Create it");
    }
}
