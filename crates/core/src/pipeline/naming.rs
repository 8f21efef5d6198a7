//! Output naming and placement.

use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

use super::error::PipelineError;
use super::types::AudioFormat;

const MAX_TITLE_CHARS: usize = 100;

const RESERVED_NAMES: &[&str] = &[
    "con", "prn", "aux", "nul", "com1", "com2", "com3", "com4", "com5", "com6", "com7", "com8",
    "com9", "lpt1", "lpt2", "lpt3", "lpt4", "lpt5", "lpt6", "lpt7", "lpt8", "lpt9",
];

/// Makes a title safe to use as a filename on every platform.
pub fn sanitize_title(title: &str) -> String {
    let replaced: String = title
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c if c.is_control() => ' ',
            c => c,
        })
        .collect();

    let collapsed = replaced.split_whitespace().collect::<Vec<_>>().join(" ");
    let truncated: String = collapsed.chars().take(MAX_TITLE_CHARS).collect();
    let trimmed = truncated.trim_matches(|c: char| c == '.' || c == ' ');

    if trimmed.is_empty() {
        return "audio".to_string();
    }
    if RESERVED_NAMES.contains(&trimmed.to_ascii_lowercase().as_str()) {
        return format!("_{}", trimmed);
    }
    trimmed.to_string()
}

/// First 8 hex characters of the SHA-256 of `source_url`.
pub fn source_hash(source_url: &str) -> String {
    let digest = Sha256::digest(source_url.as_bytes());
    format!("{:x}", digest)[..8].to_string()
}

/// `<sanitized title>-<hash>.<ext>`.
pub fn output_file_name(title: &str, source_url: &str, format: AudioFormat) -> String {
    format!(
        "{}-{}.{}",
        sanitize_title(title),
        source_hash(source_url),
        format.extension()
    )
}

/// Returns `dir/file_name`, or `dir/<stem>-<n>.<ext>` for the first `n`
/// that does not exist yet.
pub fn unique_destination(dir: &Path, file_name: &str) -> PathBuf {
    let candidate = dir.join(file_name);
    if !candidate.exists() {
        return candidate;
    }

    let path = Path::new(file_name);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| file_name.to_string());
    let ext = path.extension().map(|e| e.to_string_lossy().to_string());

    (2..)
        .map(|n| match &ext {
            Some(ext) => dir.join(format!("{}-{}.{}", stem, n, ext)),
            None => dir.join(format!("{}-{}", stem, n)),
        })
        .find(|p| !p.exists())
        .unwrap_or(candidate)
}

/// Moves `source` to `destination`, copying when they are on different
/// filesystems.
///
/// Failures to write into the destination directory are reported as
/// [`PipelineError::DirectoryUnavailable`].
pub async fn place_file(source: &Path, destination: &Path) -> Result<(), PipelineError> {
    let dest_dir = destination.parent().unwrap_or_else(|| Path::new("."));
    if !fs::metadata(dest_dir).await.map(|m| m.is_dir()).unwrap_or(false) {
        return Err(PipelineError::directory_unavailable(
            dest_dir,
            "output directory no longer exists",
        ));
    }

    match fs::rename(source, destination).await {
        Ok(()) => return Ok(()),
        // Cross-filesystem moves fail with EXDEV (18 on Linux)
        Err(e) if e.kind() == std::io::ErrorKind::CrossesDevices || e.raw_os_error() == Some(18) => {
            debug!("Rename across filesystems, copying {:?} instead", source);
        }
        Err(e) => return Err(map_dest_error(dest_dir, e)),
    }

    if let Err(e) = fs::copy(source, destination).await {
        let _ = fs::remove_file(destination).await;
        return Err(map_dest_error(dest_dir, e));
    }
    let _ = fs::remove_file(source).await;
    Ok(())
}

fn map_dest_error(dest_dir: &Path, e: std::io::Error) -> PipelineError {
    match e.kind() {
        std::io::ErrorKind::PermissionDenied
        | std::io::ErrorKind::NotFound
        | std::io::ErrorKind::ReadOnlyFilesystem
        | std::io::ErrorKind::StorageFull => PipelineError::directory_unavailable(dest_dir, e),
        _ => PipelineError::Io(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use tempfile::TempDir;

    #[test]
    fn test_sanitize_title() {
        assert_eq!(sanitize_title("AC/DC: Back in Black?"), "AC_DC_ Back in Black_");
        assert_eq!(sanitize_title("  spaced \t\n out  "), "spaced out");
        assert_eq!(sanitize_title("..."), "audio");
        assert_eq!(sanitize_title("CON"), "_CON");
        assert_eq!(sanitize_title(&"x".repeat(300)).chars().count(), MAX_TITLE_CHARS);
        assert_eq!(sanitize_title("Café ☕"), "Café ☕");
    }

    #[test]
    fn test_output_file_name_is_stable_and_distinct() {
        let a = output_file_name("Song", "https://youtu.be/a", AudioFormat::Mp3);
        let b = output_file_name("Song", "https://youtu.be/b", AudioFormat::Mp3);
        assert_eq!(a, output_file_name("Song", "https://youtu.be/a", AudioFormat::Mp3));
        assert_ne!(a, b);
        assert!(a.starts_with("Song-"));
        assert!(a.ends_with(".mp3"));
        assert_eq!(source_hash("x").len(), 8);
    }

    #[test]
    fn test_unique_destination_adds_suffix() {
        let dir = TempDir::new().unwrap();
        assert_eq!(unique_destination(dir.path(), "a.mp3"), dir.path().join("a.mp3"));

        std::fs::write(dir.path().join("a.mp3"), "1").unwrap();
        assert_eq!(unique_destination(dir.path(), "a.mp3"), dir.path().join("a-2.mp3"));

        std::fs::write(dir.path().join("a-2.mp3"), "2").unwrap();
        assert_eq!(unique_destination(dir.path(), "a.mp3"), dir.path().join("a-3.mp3"));
    }

    #[tokio::test]
    async fn test_place_file_moves() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src.mp3");
        let out = dir.path().join("out");
        std::fs::create_dir_all(&out).unwrap();
        std::fs::write(&src, "audio").unwrap();

        let dest = out.join("final.mp3");
        place_file(&src, &dest).await.unwrap();
        assert!(!src.exists());
        assert_eq!(std::fs::read_to_string(&dest).unwrap(), "audio");
    }

    #[tokio::test]
    async fn test_place_file_missing_output_dir() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src.mp3");
        std::fs::write(&src, "audio").unwrap();

        let err = place_file(&src, &dir.path().join("gone").join("x.mp3"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DirectoryUnavailable);
        assert!(src.exists());
    }
}
