//! Binary resolution with layered fallback strategies.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

use super::error::ResolveError;
use super::guidance::{install_guidance, not_executable_hint};
use super::types::Platform;

/// Where a resolved binary was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryLocation {
    /// The project-local binary directory.
    ProjectLocal,
    /// An entry of the system search path.
    SystemPath,
    /// A well-known package-manager or user-local directory.
    CommonInstall,
    /// A path supplied by the caller.
    Custom,
}

/// One resolution strategy, in the order they are tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    CustomPath,
    ProjectPlatformSpecific,
    ProjectBare,
    SearchPath,
    CommonInstallDir,
}

impl Strategy {
    pub fn label(&self) -> &'static str {
        match self {
            Self::CustomPath => "custom path",
            Self::ProjectPlatformSpecific => "project bin, platform-specific name",
            Self::ProjectBare => "project bin, bare name",
            Self::SearchPath => "system search path",
            Self::CommonInstallDir => "common install directory",
        }
    }

    fn location(&self) -> BinaryLocation {
        match self {
            Self::CustomPath => BinaryLocation::Custom,
            Self::ProjectPlatformSpecific | Self::ProjectBare => BinaryLocation::ProjectLocal,
            Self::SearchPath => BinaryLocation::SystemPath,
            Self::CommonInstallDir => BinaryLocation::CommonInstall,
        }
    }
}

/// A candidate path checked during resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attempt {
    pub strategy: Strategy,
    pub path: PathBuf,
}

/// A successfully resolved binary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinaryDescriptor {
    logical_name: String,
    path: PathBuf,
    location: BinaryLocation,
}

impl BinaryDescriptor {
    fn new(logical_name: impl Into<String>, path: PathBuf, location: BinaryLocation) -> Self {
        Self {
            logical_name: logical_name.into(),
            path,
            location,
        }
    }

    pub fn logical_name(&self) -> &str {
        &self.logical_name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn location(&self) -> BinaryLocation {
        self.location
    }
}

/// Maps role aliases onto executable names.
pub fn canonical_name(logical_name: &str) -> &str {
    match logical_name {
        "downloader" => "yt-dlp",
        "transcoder" => "ffmpeg",
        other => other,
    }
}

/// Resolves logical binary names to executable files.
#[derive(Debug, Clone)]
pub struct BinaryResolver {
    platform: Arc<Platform>,
}

impl BinaryResolver {
    pub fn new(platform: Arc<Platform>) -> Self {
        Self { platform }
    }

    pub fn platform(&self) -> &Platform {
        &self.platform
    }

    /// Resolves a binary. A custom path, when given, is the only accepted
    /// location.
    pub fn resolve(
        &self,
        logical_name: &str,
        custom_path: Option<&Path>,
    ) -> Result<BinaryDescriptor, ResolveError> {
        let logical_name = logical_name.trim();
        if logical_name.is_empty() {
            return Err(ResolveError::EmptyName);
        }
        let name = canonical_name(logical_name);
        let mut search = Search::new(name, &self.platform);

        if let Some(custom) = custom_path {
            for candidate in self.custom_candidates(custom) {
                if let Some(found) = search.check(Strategy::CustomPath, candidate)? {
                    return Ok(found);
                }
            }
            // Auto-detected paths are listed in the report but never used
            // in place of a configured binary.
            for (strategy, path) in self.auto_candidates(name) {
                search.record(strategy, path);
            }
            warn!("Custom path {:?} for {} not found", custom, name);
            return Err(ResolveError::not_found(
                name,
                search.attempts,
                install_guidance(name, &self.platform),
            ));
        }

        for (strategy, path) in self.auto_candidates(name) {
            if let Some(found) = search.check(strategy, path)? {
                return Ok(found);
            }
        }

        Err(ResolveError::not_found(
            name,
            search.attempts,
            install_guidance(name, &self.platform),
        ))
    }

    /// Resolves several binaries, failing on the first one that cannot be
    /// resolved.
    pub fn resolve_all(
        &self,
        requests: &[(&str, Option<&Path>)],
    ) -> Result<Vec<BinaryDescriptor>, ResolveError> {
        requests
            .iter()
            .map(|(name, custom)| self.resolve(name, *custom))
            .collect()
    }

    /// Auto-detection candidates in the order they are tried.
    fn auto_candidates(&self, name: &str) -> Vec<(Strategy, PathBuf)> {
        let bin_dir = self.platform.bin_dir();
        let mut candidates = vec![
            (
                Strategy::ProjectPlatformSpecific,
                bin_dir.join(self.platform.platform_specific_name(name)),
            ),
            (Strategy::ProjectBare, bin_dir.join(name)),
        ];

        let variants = self.platform.name_variants(name);
        for dir in self.platform.search_path() {
            for variant in &variants {
                candidates.push((Strategy::SearchPath, dir.join(variant)));
            }
        }
        for dir in self.platform.common_install_dirs() {
            for variant in &variants {
                candidates.push((Strategy::CommonInstallDir, dir.join(variant)));
            }
        }
        candidates
    }

    /// Candidate paths for a caller-supplied custom path.
    ///
    /// A bare filename is looked up in the project binary directory; any
    /// other relative path is taken relative to the working directory.
    fn custom_candidates(&self, custom: &Path) -> Vec<PathBuf> {
        let file_name = match custom.file_name() {
            Some(name) => name.to_string_lossy().to_string(),
            None => return vec![custom.to_path_buf()],
        };

        let base = match custom.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => {
                if parent.is_absolute() {
                    parent.to_path_buf()
                } else {
                    self.platform.working_dir().join(parent)
                }
            }
            _ => self.platform.bin_dir(),
        };

        let mut names = vec![file_name.clone()];
        let with_suffix = self.platform.platform_specific_name(&file_name);
        if !names.contains(&with_suffix) {
            names.push(with_suffix);
        }
        if let Some(stripped) = self.platform.strip_executable_suffix(&file_name) {
            if !names.contains(&stripped) {
                names.push(stripped);
            }
        }

        names.into_iter().map(|n| base.join(n)).collect()
    }
}

/// Accumulates attempts for one resolution call.
struct Search<'a> {
    name: &'a str,
    platform: &'a Platform,
    attempts: Vec<Attempt>,
}

impl<'a> Search<'a> {
    fn new(name: &'a str, platform: &'a Platform) -> Self {
        Self {
            name,
            platform,
            attempts: Vec::new(),
        }
    }

    /// Adds an attempt to the report. Returns false for duplicates.
    fn record(&mut self, strategy: Strategy, path: PathBuf) -> bool {
        if self
            .attempts
            .iter()
            .any(|a| a.strategy == strategy && a.path == path)
        {
            return false;
        }
        self.attempts.push(Attempt { strategy, path });
        true
    }

    fn check(
        &mut self,
        strategy: Strategy,
        path: PathBuf,
    ) -> Result<Option<BinaryDescriptor>, ResolveError> {
        if !self.record(strategy, path.clone()) || !path.is_file() {
            return Ok(None);
        }

        // Extensionless files on a Windows search path are shell shims,
        // not candidates.
        if self.platform.os().is_windows()
            && matches!(strategy, Strategy::SearchPath | Strategy::CommonInstallDir)
            && path.extension().is_none()
        {
            return Ok(None);
        }

        if !self.platform.is_executable(&path) {
            return Err(ResolveError::NotExecutable {
                name: self.name.to_string(),
                remediation: not_executable_hint(&path, self.platform.os()),
                path,
            });
        }

        debug!(
            "Resolved {} via {} at {:?}",
            self.name,
            strategy.label(),
            path
        );
        Ok(Some(BinaryDescriptor::new(
            self.name,
            path,
            strategy.location(),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::platform::OsFamily;
    use std::collections::HashSet;
    use tempfile::TempDir;

    fn isolated_platform(root: &Path) -> Platform {
        Platform::builder(OsFamily::current(), root)
            .install_dirs(vec![])
            .build()
    }

    #[cfg(unix)]
    fn write_executable(path: &Path) {
        use std::os::unix::fs::PermissionsExt;
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, "#!/bin/sh\nexit 0\n").unwrap();
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[test]
    fn test_canonical_name_aliases() {
        assert_eq!(canonical_name("downloader"), "yt-dlp");
        assert_eq!(canonical_name("transcoder"), "ffmpeg");
        assert_eq!(canonical_name("sox"), "sox");
    }

    #[test]
    fn test_empty_name_rejected() {
        let dir = TempDir::new().unwrap();
        let resolver = BinaryResolver::new(Arc::new(isolated_platform(dir.path())));
        let err = resolver.resolve("  ", None).unwrap_err();
        assert!(matches!(err, ResolveError::EmptyName));
    }

    #[test]
    fn test_not_found_lists_every_strategy() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("bin")).unwrap();
        let empty_path = dir.path().join("empty-path");
        std::fs::create_dir_all(&empty_path).unwrap();
        let common = dir.path().join("common");

        let platform = Platform::builder(OsFamily::current(), dir.path())
            .var("PATH", empty_path.to_string_lossy().to_string())
            .install_dirs(vec![common])
            .build();
        let resolver = BinaryResolver::new(Arc::new(platform));

        let err = resolver.resolve("ffmpeg", None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BinaryNotFound);

        let strategies: HashSet<Strategy> = err.attempts().iter().map(|a| a.strategy).collect();
        assert!(strategies.contains(&Strategy::ProjectPlatformSpecific));
        assert!(strategies.contains(&Strategy::ProjectBare));
        assert!(strategies.contains(&Strategy::SearchPath));
        assert!(strategies.contains(&Strategy::CommonInstallDir));

        let message = err.to_string();
        assert!(message.contains("system search path"));
        assert!(message.contains("https://"));
    }

    #[test]
    fn test_bare_custom_name_tried_in_bin_dir() {
        let dir = TempDir::new().unwrap();
        let resolver = BinaryResolver::new(Arc::new(isolated_platform(dir.path())));

        let err = resolver
            .resolve("ffmpeg", Some(Path::new("my-ffmpeg")))
            .unwrap_err();

        let custom: Vec<&PathBuf> = err
            .attempts()
            .iter()
            .filter(|a| a.strategy == Strategy::CustomPath)
            .map(|a| &a.path)
            .collect();
        let bin_dir = dir.path().join("bin");
        assert!(custom.contains(&&bin_dir.join("my-ffmpeg")));
        assert!(custom.len() >= 2);
        assert!(custom.iter().all(|p| p.starts_with(&bin_dir)));
    }

    #[cfg(unix)]
    #[test]
    fn test_project_bin_preferred_over_search_path() {
        let dir = TempDir::new().unwrap();
        let path_dir = dir.path().join("usr-bin");
        write_executable(&dir.path().join("bin").join("yt-dlp"));
        write_executable(&path_dir.join("yt-dlp"));

        let platform = Platform::builder(OsFamily::Linux, dir.path())
            .var("PATH", path_dir.to_string_lossy().to_string())
            .install_dirs(vec![])
            .build();
        let resolver = BinaryResolver::new(Arc::new(platform));

        let found = resolver.resolve("downloader", None).unwrap();
        assert_eq!(found.location(), BinaryLocation::ProjectLocal);
        assert_eq!(found.logical_name(), "yt-dlp");
    }

    #[cfg(unix)]
    #[test]
    fn test_platform_specific_name_checked_first() {
        let dir = TempDir::new().unwrap();
        write_executable(&dir.path().join("bin").join("yt-dlp_linux"));
        write_executable(&dir.path().join("bin").join("yt-dlp"));

        let platform = Platform::builder(OsFamily::Linux, dir.path())
            .install_dirs(vec![])
            .build();
        let found = BinaryResolver::new(Arc::new(platform))
            .resolve("yt-dlp", None)
            .unwrap();
        assert!(found.path().ends_with("yt-dlp_linux"));
    }

    #[cfg(unix)]
    #[test]
    fn test_custom_path_wins() {
        let dir = TempDir::new().unwrap();
        let path_dir = dir.path().join("usr-bin");
        let custom = dir.path().join("tools").join("ffmpeg-custom");
        write_executable(&dir.path().join("bin").join("ffmpeg"));
        write_executable(&path_dir.join("ffmpeg"));
        write_executable(&custom);

        let platform = Platform::builder(OsFamily::Linux, dir.path())
            .var("PATH", path_dir.to_string_lossy().to_string())
            .install_dirs(vec![])
            .build();
        let found = BinaryResolver::new(Arc::new(platform))
            .resolve("ffmpeg", Some(&custom))
            .unwrap();

        assert_eq!(found.location(), BinaryLocation::Custom);
        assert_eq!(found.path(), custom.as_path());
    }

    #[cfg(unix)]
    #[test]
    fn test_missing_custom_path_never_falls_back() {
        let dir = TempDir::new().unwrap();
        let path_dir = dir.path().join("usr-bin");
        write_executable(&path_dir.join("ffmpeg"));
        write_executable(&dir.path().join("bin").join("ffmpeg"));

        let platform = Platform::builder(OsFamily::Linux, dir.path())
            .var("PATH", path_dir.to_string_lossy().to_string())
            .install_dirs(vec![dir.path().join("common")])
            .build();
        let err = BinaryResolver::new(Arc::new(platform))
            .resolve("ffmpeg", Some(Path::new("my-ffmpeg")))
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::BinaryNotFound);
        let strategies: HashSet<Strategy> = err.attempts().iter().map(|a| a.strategy).collect();
        assert!(strategies.contains(&Strategy::CustomPath));
        assert!(strategies.len() >= 4);
        assert!(err
            .attempts()
            .iter()
            .any(|a| a.path == path_dir.join("ffmpeg")));
    }

    #[test]
    fn test_windows_shim_without_extension_is_skipped() {
        let dir = TempDir::new().unwrap();
        let npm = dir.path().join("npm");
        std::fs::create_dir_all(&npm).unwrap();
        std::fs::write(npm.join("ffmpeg"), "#!/bin/sh\n").unwrap();
        std::fs::write(npm.join("ffmpeg.cmd"), "@echo off\r\n").unwrap();

        let platform = Platform::builder(OsFamily::Windows, dir.path())
            .var("PATH", npm.to_string_lossy().to_string())
            .install_dirs(vec![])
            .build();
        let found = BinaryResolver::new(Arc::new(platform))
            .resolve("ffmpeg", None)
            .unwrap();

        assert_eq!(found.location(), BinaryLocation::SystemPath);
        assert_eq!(found.path(), npm.join("ffmpeg.cmd").as_path());
    }

    #[cfg(unix)]
    #[test]
    fn test_custom_with_stripped_suffix() {
        let dir = TempDir::new().unwrap();
        write_executable(&dir.path().join("bin").join("ffmpeg"));

        let platform = Platform::builder(OsFamily::Linux, dir.path())
            .install_dirs(vec![])
            .build();
        let found = BinaryResolver::new(Arc::new(platform))
            .resolve("ffmpeg", Some(Path::new("ffmpeg.exe")))
            .unwrap();
        assert_eq!(found.location(), BinaryLocation::Custom);
        assert!(found.path().ends_with("bin/ffmpeg"));
    }

    #[cfg(unix)]
    #[test]
    fn test_not_executable_is_reported() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bin").join("ffmpeg");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "data").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();

        let resolver = BinaryResolver::new(Arc::new(isolated_platform(dir.path())));
        let err = resolver.resolve("ffmpeg", None).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::BinaryNotExecutable);
        assert!(err.remediation().unwrap().contains("chmod +x"));
    }

    #[cfg(unix)]
    #[test]
    fn test_search_path_and_common_dirs() {
        let dir = TempDir::new().unwrap();
        let common = dir.path().join("homebrew");
        write_executable(&common.join("ffmpeg"));

        let platform = Platform::builder(OsFamily::Linux, dir.path())
            .var("PATH", dir.path().join("nothing").to_string_lossy().to_string())
            .install_dirs(vec![common.clone()])
            .build();
        let found = BinaryResolver::new(Arc::new(platform))
            .resolve("ffmpeg", None)
            .unwrap();
        assert_eq!(found.location(), BinaryLocation::CommonInstall);
        assert_eq!(found.path(), common.join("ffmpeg").as_path());
    }

    #[cfg(unix)]
    #[test]
    fn test_resolve_all_stops_at_first_failure() {
        let dir = TempDir::new().unwrap();
        write_executable(&dir.path().join("bin").join("yt-dlp"));

        let resolver = BinaryResolver::new(Arc::new(isolated_platform(dir.path())));
        let err = resolver
            .resolve_all(&[("downloader", None), ("transcoder", None)])
            .unwrap_err();
        assert!(err.to_string().contains("'ffmpeg'"));
    }
}
