//! Platform detection.

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Files whose presence marks a directory as the project root.
pub const PROJECT_MANIFESTS: &[&str] = &["audiograb.toml", "Cargo.toml"];

/// Name of the project-local binary directory.
pub const BIN_DIR_NAME: &str = "bin";

/// Environment variables captured when the platform is detected.
const SNAPSHOT_VARS: &[&str] = &[
    "PATH",
    "PATHEXT",
    "HOME",
    "USERPROFILE",
    "LOCALAPPDATA",
    "APPDATA",
    "PROGRAMDATA",
    "ProgramFiles",
    "TEMP",
    "TMP",
    "TMPDIR",
];

/// Default executable extensions on Windows when `PATHEXT` is unset.
const DEFAULT_PATHEXT: &[&str] = &[".exe", ".cmd", ".bat", ".com"];

/// Suffixes that mark a platform-specific build of a binary.
const PLATFORM_TAGS: &[&str] = &["_linux", "_macos"];

static CURRENT: OnceCell<Arc<Platform>> = OnceCell::new();

/// Operating system family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OsFamily {
    Windows,
    Linux,
    MacOs,
    Unknown,
}

impl OsFamily {
    /// The family this binary was compiled for.
    pub fn current() -> Self {
        if cfg!(windows) {
            Self::Windows
        } else if cfg!(target_os = "macos") {
            Self::MacOs
        } else if cfg!(target_os = "linux") {
            Self::Linux
        } else {
            Self::Unknown
        }
    }

    /// Path component separator.
    pub fn path_separator(&self) -> char {
        match self {
            Self::Windows => '\\',
            _ => '/',
        }
    }

    /// Separator between entries of the search path variable.
    pub fn search_path_delimiter(&self) -> char {
        match self {
            Self::Windows => ';',
            _ => ':',
        }
    }

    /// Native executable suffix (empty on Unix-likes).
    pub fn exe_suffix(&self) -> &'static str {
        match self {
            Self::Windows => ".exe",
            _ => "",
        }
    }

    /// Tag appended to standalone builds targeting this family.
    pub fn platform_tag(&self) -> Option<&'static str> {
        match self {
            Self::Linux => Some("_linux"),
            Self::MacOs => Some("_macos"),
            _ => None,
        }
    }

    pub fn is_windows(&self) -> bool {
        matches!(self, Self::Windows)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Windows => "windows",
            Self::Linux => "linux",
            Self::MacOs => "macos",
            Self::Unknown => "unknown",
        }
    }
}

/// Everything binary resolution and process execution need to know about
/// the host.
///
/// Computed once with [`Platform::detect`] (or shared through
/// [`Platform::current`]) and passed explicitly to the resolver and the
/// executor. Tests build doubles with [`Platform::builder`].
#[derive(Debug, Clone)]
pub struct Platform {
    os: OsFamily,
    project_root: PathBuf,
    working_dir: PathBuf,
    home_dir: Option<PathBuf>,
    vars: HashMap<String, String>,
    install_dirs: Option<Vec<PathBuf>>,
}

impl Platform {
    /// Detects the current platform.
    pub fn detect() -> Self {
        let working_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let project_root =
            find_project_root(&working_dir).unwrap_or_else(|| working_dir.clone());

        let vars = SNAPSHOT_VARS
            .iter()
            .filter_map(|name| std::env::var(name).ok().map(|v| (name.to_string(), v)))
            .collect();

        Self {
            os: OsFamily::current(),
            project_root,
            working_dir,
            home_dir: dirs::home_dir(),
            vars,
            install_dirs: None,
        }
    }

    /// Process-wide platform value, detected on first use.
    pub fn current() -> Arc<Platform> {
        Arc::clone(CURRENT.get_or_init(|| {
            let platform = Platform::detect();
            tracing::debug!(
                "Detected platform {} with project root {:?}",
                platform.os.as_str(),
                platform.project_root
            );
            Arc::new(platform)
        }))
    }

    /// Starts building a platform value with an empty environment.
    pub fn builder(os: OsFamily, project_root: impl Into<PathBuf>) -> PlatformBuilder {
        let project_root = project_root.into();
        PlatformBuilder {
            platform: Platform {
                os,
                working_dir: project_root.clone(),
                project_root,
                home_dir: None,
                vars: HashMap::new(),
                install_dirs: None,
            },
        }
    }

    /// Returns a copy rooted at a different project directory.
    pub fn with_project_root(&self, project_root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
            ..self.clone()
        }
    }

    pub fn os(&self) -> OsFamily {
        self.os
    }

    pub fn path_separator(&self) -> char {
        self.os.path_separator()
    }

    pub fn exe_suffix(&self) -> &'static str {
        self.os.exe_suffix()
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    pub fn home_dir(&self) -> Option<&Path> {
        self.home_dir.as_deref()
    }

    /// Returns a captured environment variable.
    pub fn var(&self, name: &str) -> Option<&str> {
        self.vars
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    fn var_path(&self, name: &str) -> Option<PathBuf> {
        self.var(name).map(PathBuf::from)
    }

    /// The project-local binary directory.
    pub fn bin_dir(&self) -> PathBuf {
        self.project_root.join(BIN_DIR_NAME)
    }

    /// Entries of the captured search path, in order.
    pub fn search_path(&self) -> Vec<PathBuf> {
        self.var("PATH")
            .map(|path| {
                path.split(self.os.search_path_delimiter())
                    .filter(|entry| !entry.trim().is_empty())
                    .map(|entry| PathBuf::from(entry.trim().trim_matches('"')))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Executable extensions, lowercase with leading dot. Empty off Windows.
    pub fn executable_suffixes(&self) -> Vec<String> {
        if !self.os.is_windows() {
            return Vec::new();
        }
        match self.var("PATHEXT") {
            Some(pathext) => pathext
                .split(';')
                .map(|s| s.trim().to_ascii_lowercase())
                .filter(|s| s.starts_with('.') && s.len() > 1)
                .collect(),
            None => DEFAULT_PATHEXT.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// The platform-specific filename for a binary: `name.exe` on Windows,
    /// `name_linux` / `name_macos` for standalone Unix builds.
    pub fn platform_specific_name(&self, name: &str) -> String {
        let suffix = match self.os {
            OsFamily::Windows => ".exe",
            other => match other.platform_tag() {
                Some(tag) => tag,
                None => return name.to_string(),
            },
        };
        if name.to_ascii_lowercase().ends_with(suffix) {
            name.to_string()
        } else {
            format!("{}{}", name, suffix)
        }
    }

    /// Removes a known executable extension or platform tag from a name.
    ///
    /// Returns `None` when there is nothing to strip.
    pub fn strip_executable_suffix(&self, name: &str) -> Option<String> {
        let lower = name.to_ascii_lowercase();
        DEFAULT_PATHEXT
            .iter()
            .chain(PLATFORM_TAGS.iter())
            .find(|suffix| lower.ends_with(*suffix) && lower.len() > suffix.len())
            .map(|suffix| name[..name.len() - suffix.len()].to_string())
    }

    /// Every filename a binary may plausibly have on this platform.
    pub fn name_variants(&self, name: &str) -> Vec<String> {
        let mut variants = vec![name.to_string()];
        for suffix in self.executable_suffixes() {
            variants.push(format!("{}{}", name, suffix));
        }
        variants.push(self.platform_specific_name(name));
        dedup_preserving_order(variants)
    }

    /// Package-manager and user-local binary directories for this platform.
    pub fn common_install_dirs(&self) -> Vec<PathBuf> {
        if let Some(dirs) = &self.install_dirs {
            return dirs.clone();
        }

        let home = self.home_dir.clone();
        let mut dirs = Vec::new();

        match self.os {
            OsFamily::Windows => {
                if let Some(local) = self.var_path("LOCALAPPDATA") {
                    dirs.push(local.join("Microsoft").join("WinGet").join("Links"));
                    dirs.push(local.join("Microsoft").join("WindowsApps"));
                }
                if let Some(profile) = self.var_path("USERPROFILE").or(home) {
                    dirs.push(profile.join("scoop").join("shims"));
                }
                if let Some(program_data) = self.var_path("PROGRAMDATA") {
                    dirs.push(program_data.join("chocolatey").join("bin"));
                }
                if let Some(program_files) = self.var_path("ProgramFiles") {
                    dirs.push(program_files.join("ffmpeg").join("bin"));
                    dirs.push(program_files.join("yt-dlp"));
                }
                if let Some(app_data) = self.var_path("APPDATA") {
                    dirs.push(app_data.join("Python").join("Scripts"));
                }
            }
            OsFamily::MacOs => {
                dirs.push(PathBuf::from("/opt/homebrew/bin"));
                dirs.push(PathBuf::from("/usr/local/bin"));
                dirs.push(PathBuf::from("/opt/local/bin"));
                if let Some(home) = home {
                    dirs.push(home.join(".local").join("bin"));
                    dirs.push(home.join("bin"));
                }
            }
            OsFamily::Linux => {
                dirs.push(PathBuf::from("/usr/local/bin"));
                dirs.push(PathBuf::from("/usr/bin"));
                dirs.push(PathBuf::from("/snap/bin"));
                dirs.push(PathBuf::from("/home/linuxbrew/.linuxbrew/bin"));
                if let Some(home) = home {
                    dirs.push(home.join(".local").join("bin"));
                    dirs.push(home.join("bin"));
                }
            }
            OsFamily::Unknown => {
                dirs.push(PathBuf::from("/usr/local/bin"));
                dirs.push(PathBuf::from("/usr/bin"));
                if let Some(home) = home {
                    dirs.push(home.join(".local").join("bin"));
                }
            }
        }

        dirs
    }

    /// Whether an existing file may be executed.
    pub fn is_executable(&self, path: &Path) -> bool {
        if self.os.is_windows() {
            let suffixes = self.executable_suffixes();
            return path
                .extension()
                .map(|ext| {
                    let ext = format!(".{}", ext.to_string_lossy().to_ascii_lowercase());
                    suffixes.contains(&ext)
                })
                .unwrap_or(false);
        }
        has_execute_bit(path)
    }
}

#[cfg(unix)]
fn has_execute_bit(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn has_execute_bit(path: &Path) -> bool {
    path.is_file()
}

/// Builder for [`Platform`] test doubles and embedders.
#[derive(Debug, Clone)]
pub struct PlatformBuilder {
    platform: Platform,
}

impl PlatformBuilder {
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.platform.working_dir = dir.into();
        self
    }

    pub fn home_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.platform.home_dir = Some(dir.into());
        self
    }

    pub fn var(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.platform.vars.insert(name.into(), value.into());
        self
    }

    /// Replaces the computed common installation directories.
    pub fn install_dirs(mut self, dirs: Vec<PathBuf>) -> Self {
        self.platform.install_dirs = Some(dirs);
        self
    }

    pub fn build(self) -> Platform {
        self.platform
    }
}

/// Walks up from `start` looking for a project manifest.
pub fn find_project_root(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| PROJECT_MANIFESTS.iter().any(|m| dir.join(m).is_file()))
        .map(Path::to_path_buf)
}

fn dedup_preserving_order(items: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(items.len());
    for item in items {
        if !out.contains(&item) {
            out.push(item);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_os_family_properties() {
        assert_eq!(OsFamily::Windows.exe_suffix(), ".exe");
        assert_eq!(OsFamily::Linux.exe_suffix(), "");
        assert_eq!(OsFamily::Windows.path_separator(), '\\');
        assert_eq!(OsFamily::MacOs.path_separator(), '/');
        assert_eq!(OsFamily::Linux.platform_tag(), Some("_linux"));
    }

    #[test]
    fn test_current_is_memoized() {
        let a = Platform::current();
        let b = Platform::current();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_find_project_root_walks_up() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("audiograb.toml"), "").unwrap();
        let nested = dir.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();

        assert_eq!(find_project_root(&nested).unwrap(), dir.path());
    }

    #[test]
    fn test_search_path_split_per_family() {
        let windows = Platform::builder(OsFamily::Windows, "C:/proj")
            .var("PATH", r"C:\bin;;C:\tools")
            .build();
        assert_eq!(windows.search_path().len(), 2);

        let linux = Platform::builder(OsFamily::Linux, "/proj")
            .var("PATH", "/usr/bin:/bin")
            .build();
        assert_eq!(
            linux.search_path(),
            vec![PathBuf::from("/usr/bin"), PathBuf::from("/bin")]
        );
    }

    #[test]
    fn test_name_variants() {
        let windows = Platform::builder(OsFamily::Windows, "C:/proj")
            .var("PATHEXT", ".EXE;.CMD")
            .build();
        assert_eq!(
            windows.name_variants("ffmpeg"),
            vec!["ffmpeg", "ffmpeg.exe", "ffmpeg.cmd"]
        );

        let linux = Platform::builder(OsFamily::Linux, "/proj").build();
        assert_eq!(linux.name_variants("yt-dlp"), vec!["yt-dlp", "yt-dlp_linux"]);
    }

    #[test]
    fn test_platform_specific_name() {
        let mac = Platform::builder(OsFamily::MacOs, "/proj").build();
        assert_eq!(mac.platform_specific_name("yt-dlp"), "yt-dlp_macos");
        assert_eq!(mac.platform_specific_name("yt-dlp_macos"), "yt-dlp_macos");

        let windows = Platform::builder(OsFamily::Windows, "C:/proj").build();
        assert_eq!(windows.platform_specific_name("ffmpeg.EXE"), "ffmpeg.EXE");
    }

    #[test]
    fn test_strip_executable_suffix() {
        let linux = Platform::builder(OsFamily::Linux, "/proj").build();
        assert_eq!(linux.strip_executable_suffix("ffmpeg.exe").unwrap(), "ffmpeg");
        assert_eq!(linux.strip_executable_suffix("yt-dlp_linux").unwrap(), "yt-dlp");
        assert!(linux.strip_executable_suffix("ffmpeg").is_none());
        assert!(linux.strip_executable_suffix(".exe").is_none());
    }

    #[test]
    fn test_install_dirs_override() {
        let platform = Platform::builder(OsFamily::Linux, "/proj")
            .install_dirs(vec![])
            .build();
        assert!(platform.common_install_dirs().is_empty());

        let defaults = Platform::builder(OsFamily::Linux, "/proj")
            .home_dir("/home/me")
            .build();
        assert!(defaults
            .common_install_dirs()
            .contains(&PathBuf::from("/home/me/.local/bin")));
    }

    #[test]
    fn test_windows_executable_by_extension() {
        let windows = Platform::builder(OsFamily::Windows, "C:/proj").build();
        assert!(windows.is_executable(Path::new("C:/bin/ffmpeg.exe")));
        assert!(!windows.is_executable(Path::new("C:/bin/ffmpeg")));
    }

    #[cfg(unix)]
    #[test]
    fn test_unix_execute_bit() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tool");
        std::fs::write(&path, "#!/bin/sh\n").unwrap();
        let platform = Platform::builder(OsFamily::Linux, dir.path()).build();

        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();
        assert!(!platform.is_executable(&path));

        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        assert!(platform.is_executable(&path));
    }
}
