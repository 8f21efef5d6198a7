//! Child-process environment normalization.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use super::error::ExecutorError;
use crate::platform::{OsFamily, Platform};

/// Name of the process-owned directory under the project root.
const OWNED_DIR: &str = ".audiograb";

/// When to normalize the environment of child processes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvironmentMode {
    /// Only on platforms that need it (Windows).
    #[default]
    Auto,
    /// On every platform.
    Always,
    /// Never; children inherit the environment untouched.
    Never,
}

impl EnvironmentMode {
    pub fn applies_to(&self, os: OsFamily) -> bool {
        match self {
            Self::Auto => os.is_windows(),
            Self::Always => true,
            Self::Never => false,
        }
    }
}

/// Environment changes applied to every child process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentPlan {
    search_path: Vec<PathBuf>,
    temp_dir: PathBuf,
    vars: Vec<(String, String)>,
}

impl EnvironmentPlan {
    /// Computes the plan for a platform, or `None` when the mode says the
    /// environment should be left alone.
    pub fn for_platform(
        platform: &Platform,
        mode: EnvironmentMode,
    ) -> Result<Option<Self>, ExecutorError> {
        if !mode.applies_to(platform.os()) {
            return Ok(None);
        }

        let search_path = augmented_search_path(platform);
        let temp_dir = select_temp_dir(platform)?;

        let joined = search_path
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(&platform.os().search_path_delimiter().to_string());
        let temp = temp_dir.display().to_string();

        let mut vars = vec![
            ("PATH".to_string(), joined),
            ("TEMP".to_string(), temp.clone()),
            ("TMP".to_string(), temp.clone()),
        ];
        if !platform.os().is_windows() {
            vars.push(("TMPDIR".to_string(), temp));
        }
        vars.extend([
            ("PYTHONIOENCODING".to_string(), "utf-8".to_string()),
            ("PYTHONUTF8".to_string(), "1".to_string()),
            ("PYTHONUNBUFFERED".to_string(), "1".to_string()),
        ]);

        debug!(
            "Environment plan: {} search path entries, temp dir {:?}",
            search_path.len(),
            temp_dir
        );

        Ok(Some(Self {
            search_path,
            temp_dir,
            vars,
        }))
    }

    pub fn search_path(&self) -> &[PathBuf] {
        &self.search_path
    }

    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }

    pub fn vars(&self) -> &[(String, String)] {
        &self.vars
    }

    pub fn var(&self, name: &str) -> Option<&str> {
        self.vars
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn apply(&self, cmd: &mut tokio::process::Command) {
        for (key, value) in &self.vars {
            cmd.env(key, value);
        }
    }
}

/// The project binary directory, then the inherited search path, then the
/// platform's common install directories. Added directories must exist;
/// duplicates are dropped.
fn augmented_search_path(platform: &Platform) -> Vec<PathBuf> {
    let mut entries: Vec<PathBuf> = Vec::new();
    let mut seen: Vec<String> = Vec::new();

    let mut push = |path: PathBuf, require_existing: bool| {
        if require_existing && !path.is_dir() {
            return;
        }
        let key = path_key(&path, platform.os());
        if !seen.contains(&key) {
            seen.push(key);
            entries.push(path);
        }
    };

    push(platform.bin_dir(), true);
    for dir in platform.search_path() {
        push(dir, false);
    }
    for dir in platform.common_install_dirs() {
        push(dir, true);
    }

    entries
}

fn path_key(path: &Path, os: OsFamily) -> String {
    let text = path.display().to_string();
    let trimmed = text.trim_end_matches(['/', '\\']);
    let trimmed = if trimmed.is_empty() { text.as_str() } else { trimmed };
    if os.is_windows() {
        trimmed.replace('/', "\\").to_ascii_lowercase()
    } else {
        trimmed.to_string()
    }
}

/// Temp directory candidates in fallback order: explicit variables, the
/// system default, then the platform default.
fn temp_dir_candidates(platform: &Platform) -> Vec<PathBuf> {
    let explicit: &[&str] = if platform.os().is_windows() {
        &["TEMP", "TMP"]
    } else {
        &["TMPDIR", "TEMP", "TMP"]
    };

    let mut candidates: Vec<PathBuf> = explicit
        .iter()
        .filter_map(|name| platform.var(name).map(PathBuf::from))
        .collect();

    candidates.push(std::env::temp_dir());

    match platform.os() {
        OsFamily::Windows => {
            if let Some(local) = platform.var("LOCALAPPDATA") {
                candidates.push(PathBuf::from(local).join("Temp"));
            }
        }
        _ => candidates.push(PathBuf::from("/tmp")),
    }

    candidates
}

/// Selects the first writable temp directory, creating a process-owned
/// fallback under the project root when none of the candidates work.
pub fn select_temp_dir(platform: &Platform) -> Result<PathBuf, ExecutorError> {
    let candidates = temp_dir_candidates(platform);
    if let Some(dir) = candidates.iter().find(|dir| is_writable_dir(dir)) {
        return Ok(dir.clone());
    }

    let fallback = platform.project_root().join(OWNED_DIR).join("tmp");
    if std::fs::create_dir_all(&fallback).is_ok() && is_writable_dir(&fallback) {
        debug!("Using process-owned temp dir {:?}", fallback);
        return Ok(fallback);
    }

    let tried = candidates
        .iter()
        .chain(std::iter::once(&fallback))
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ");
    Err(ExecutorError::TempDirUnavailable { tried })
}

/// Whether a directory exists and accepts a new file.
pub(crate) fn is_writable_dir(dir: &Path) -> bool {
    if !dir.is_dir() {
        return false;
    }
    let probe = dir.join(format!(".audiograb-probe-{}", uuid::Uuid::new_v4()));
    match std::fs::write(&probe, b"") {
        Ok(()) => {
            let _ = std::fs::remove_file(&probe);
            true
        }
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_mode_applies() {
        assert!(EnvironmentMode::Auto.applies_to(OsFamily::Windows));
        assert!(!EnvironmentMode::Auto.applies_to(OsFamily::Linux));
        assert!(EnvironmentMode::Always.applies_to(OsFamily::MacOs));
        assert!(!EnvironmentMode::Never.applies_to(OsFamily::Windows));
    }

    #[test]
    fn test_auto_is_noop_off_windows() {
        let platform = Platform::builder(OsFamily::Linux, "/proj").build();
        let plan = EnvironmentPlan::for_platform(&platform, EnvironmentMode::Auto).unwrap();
        assert!(plan.is_none());
    }

    #[test]
    fn test_search_path_augmented_and_deduplicated() {
        let dir = TempDir::new().unwrap();
        let bin = dir.path().join("bin");
        let extra = dir.path().join("extra");
        std::fs::create_dir_all(&bin).unwrap();
        std::fs::create_dir_all(&extra).unwrap();
        let missing = dir.path().join("missing");

        let path_var = format!("/usr/bin:{}:/usr/bin/", bin.display());
        let platform = Platform::builder(OsFamily::Linux, dir.path())
            .var("PATH", path_var)
            .install_dirs(vec![extra.clone(), missing.clone()])
            .build();

        let plan = EnvironmentPlan::for_platform(&platform, EnvironmentMode::Always)
            .unwrap()
            .unwrap();

        assert_eq!(
            plan.search_path(),
            &[bin.clone(), PathBuf::from("/usr/bin"), extra.clone()]
        );
        assert!(!plan.search_path().contains(&missing));
        assert_eq!(
            plan.var("PATH").unwrap(),
            format!("{}:/usr/bin:{}", bin.display(), extra.display())
        );
        assert_eq!(plan.var("PYTHONIOENCODING"), Some("utf-8"));
        assert_eq!(plan.var("PYTHONUNBUFFERED"), Some("1"));
    }

    #[test]
    fn test_explicit_temp_dir_wins() {
        let dir = TempDir::new().unwrap();
        let temp = dir.path().join("my-temp");
        std::fs::create_dir_all(&temp).unwrap();

        let platform = Platform::builder(OsFamily::Linux, dir.path())
            .var("TMPDIR", temp.display().to_string())
            .install_dirs(vec![])
            .build();
        let plan = EnvironmentPlan::for_platform(&platform, EnvironmentMode::Always)
            .unwrap()
            .unwrap();

        assert_eq!(plan.temp_dir(), temp.as_path());
        assert_eq!(plan.var("TEMP"), plan.var("TMP"));
        assert_eq!(plan.var("TMPDIR").unwrap(), temp.display().to_string());
    }

    #[test]
    fn test_missing_explicit_temp_dir_falls_through() {
        let dir = TempDir::new().unwrap();
        let platform = Platform::builder(OsFamily::Linux, dir.path())
            .var("TMPDIR", dir.path().join("nope").display().to_string())
            .build();

        let selected = select_temp_dir(&platform).unwrap();
        assert_ne!(selected, dir.path().join("nope"));
        assert!(is_writable_dir(&selected));
    }

    #[test]
    fn test_is_writable_dir() {
        let dir = TempDir::new().unwrap();
        assert!(is_writable_dir(dir.path()));
        assert!(!is_writable_dir(&dir.path().join("absent")));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
