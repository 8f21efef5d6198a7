//! Parsing of the downloader's metadata output.

use serde::Deserialize;
use tracing::warn;
use url::Url;

use super::error::PipelineError;

/// Arguments for a metadata-only downloader run.
pub const METADATA_ARGS: &[&str] = &["--dump-single-json", "--flat-playlist", "--no-warnings"];

/// What a source reference expands to.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceMetadata {
    pub title: String,
    pub is_collection: bool,
    pub entries: Vec<SourceEntry>,
}

/// One downloadable entry.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceEntry {
    pub title: String,
    pub url: String,
    pub duration_secs: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawInfo {
    #[serde(rename = "_type")]
    kind: Option<String>,
    id: Option<String>,
    title: Option<String>,
    webpage_url: Option<String>,
    original_url: Option<String>,
    duration: Option<f64>,
    #[serde(default)]
    entries: Option<Vec<Option<RawEntry>>>,
}

#[derive(Debug, Deserialize)]
struct RawEntry {
    id: Option<String>,
    title: Option<String>,
    url: Option<String>,
    webpage_url: Option<String>,
    duration: Option<f64>,
}

/// Parses `--dump-single-json` output for `reference`.
///
/// Playlists expand to their entries, capped at `max_items`. Entries
/// without a usable URL are rebuilt from their id.
pub fn parse_metadata(
    json: &str,
    reference: &Url,
    max_items: usize,
) -> Result<SourceMetadata, PipelineError> {
    let info: RawInfo = serde_json::from_str(json.trim())
        .map_err(|e| PipelineError::metadata(format!("invalid JSON from downloader: {}", e)))?;

    let title = info
        .title
        .clone()
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| "Untitled".to_string());

    let is_collection = info.kind.as_deref() == Some("playlist") || info.entries.is_some();
    if !is_collection {
        let url = first_http_url(&[&info.webpage_url, &info.original_url])
            .or_else(|| info.id.as_deref().map(watch_url))
            .unwrap_or_else(|| reference.to_string());
        return Ok(SourceMetadata {
            title: title.clone(),
            is_collection: false,
            entries: vec![SourceEntry {
                title,
                url,
                duration_secs: info.duration.filter(|d| *d > 0.0),
            }],
        });
    }

    let raw_entries: Vec<RawEntry> = info.entries.unwrap_or_default().into_iter().flatten().collect();
    let available = raw_entries.len();

    let mut entries = Vec::new();
    for (idx, entry) in raw_entries.into_iter().enumerate() {
        let url = first_http_url(&[&entry.url, &entry.webpage_url])
            .or_else(|| entry.id.as_deref().map(watch_url));
        let Some(url) = url else {
            warn!("Skipping playlist entry {} without url or id", idx + 1);
            continue;
        };
        entries.push(SourceEntry {
            title: entry
                .title
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| format!("{} - {}", title, idx + 1)),
            url,
            duration_secs: entry.duration.filter(|d| *d > 0.0),
        });
    }

    if entries.is_empty() {
        return Err(PipelineError::invalid_reference(
            reference.as_str(),
            "playlist contains no downloadable entries",
        ));
    }

    if entries.len() > max_items {
        warn!(
            "Playlist '{}' has {} entries, processing the first {}",
            title,
            entries.len(),
            max_items
        );
        entries.truncate(max_items);
    } else if entries.len() < available {
        warn!(
            "Playlist '{}': {} of {} entries are usable",
            title,
            entries.len(),
            available
        );
    }

    Ok(SourceMetadata {
        title,
        is_collection: true,
        entries,
    })
}

fn first_http_url(candidates: &[&Option<String>]) -> Option<String> {
    candidates
        .iter()
        .filter_map(|c| c.as_deref())
        .find(|u| u.starts_with("http://") || u.starts_with("https://"))
        .map(str::to_string)
}

fn watch_url(id: &str) -> String {
    format!("https://www.youtube.com/watch?v={}", id)
}
