//! Progress parsing for downloader and transcoder output.

use once_cell::sync::Lazy;
use regex_lite::Regex;

static DOWNLOAD_PERCENT: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^\[download\]\s+(\d{1,3}(?:\.\d+)?)%").ok());

static OUT_TIME: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^out_time_(ms|us)=(\d+)").ok());

/// Splits streamed text into complete lines. `\r` counts as a line end
/// because progress bars redraw in place.
#[derive(Debug, Default)]
pub(crate) struct LineSplitter {
    partial: String,
}

impl LineSplitter {
    pub(crate) fn push(&mut self, chunk: &str) -> Vec<String> {
        self.partial.push_str(chunk);
        let mut lines = Vec::new();
        while let Some(pos) = self.partial.find(['\n', '\r']) {
            let line: String = self.partial.drain(..=pos).collect();
            let line = line.trim_end_matches(['\n', '\r']);
            if !line.is_empty() {
                lines.push(line.to_string());
            }
        }
        lines
    }
}

/// Extracts the percentage from a downloader progress line such as
/// `[download]  42.3% of 3.50MiB at 1.2MiB/s ETA 00:02`.
pub fn parse_download_percent(line: &str) -> Option<f32> {
    let re = DOWNLOAD_PERCENT.as_ref()?;
    let caps = re.captures(line.trim_start())?;
    let pct = caps.get(1)?.as_str().parse::<f32>().ok()?;
    Some(pct.clamp(0.0, 100.0))
}

/// Extracts the output position in seconds from a transcoder `-progress`
/// line (`out_time_ms=` and `out_time_us=` are both microseconds).
pub fn parse_out_time_secs(line: &str) -> Option<f64> {
    let re = OUT_TIME.as_ref()?;
    let caps = re.captures(line.trim())?;
    let micros = caps.get(2)?.as_str().parse::<f64>().ok()?;
    Some(micros / 1_000_000.0)
}

/// Converts a position into a percentage of `duration_secs`.
pub fn position_percent(position_secs: f64, duration_secs: f64) -> Option<f32> {
    if duration_secs <= 0.0 || !duration_secs.is_finite() {
        return None;
    }
    Some((position_secs / duration_secs * 100.0).clamp(0.0, 100.0) as f32)
}
