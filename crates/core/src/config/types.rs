use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::executor::ExecutorConfig;
use crate::pipeline::PipelineConfig;
use crate::progress::ProgressConfig;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub binaries: BinariesConfig,
    #[serde(default)]
    pub executor: ExecutorConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub progress: ProgressConfig,
}

/// Directory layout. Relative paths are resolved against the project root.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct PathsConfig {
    /// Project root; detected from the working directory when unset.
    #[serde(default)]
    pub project_root: Option<PathBuf>,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_temp_dir")]
    pub temp_dir: PathBuf,
    #[serde(default = "default_progress_dir")]
    pub progress_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            project_root: None,
            output_dir: default_output_dir(),
            temp_dir: default_temp_dir(),
            progress_dir: default_progress_dir(),
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

fn default_temp_dir() -> PathBuf {
    PathBuf::from("temp")
}

fn default_progress_dir() -> PathBuf {
    PathBuf::from("progress")
}

impl PathsConfig {
    pub fn output_dir(&self, project_root: &Path) -> PathBuf {
        resolve(project_root, &self.output_dir)
    }

    pub fn temp_dir(&self, project_root: &Path) -> PathBuf {
        resolve(project_root, &self.temp_dir)
    }

    pub fn progress_dir(&self, project_root: &Path) -> PathBuf {
        resolve(project_root, &self.progress_dir)
    }
}

fn resolve(project_root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        project_root.join(path)
    }
}

/// Custom binary locations. Unset means auto-detect.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct BinariesConfig {
    #[serde(default)]
    pub downloader: Option<PathBuf>,
    #[serde(default)]
    pub transcoder: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_resolve_against_root() {
        let paths = PathsConfig {
            output_dir: PathBuf::from("/srv/music"),
            ..PathsConfig::default()
        };
        let root = Path::new("/project");
        assert_eq!(paths.output_dir(root), PathBuf::from("/srv/music"));
        assert_eq!(paths.temp_dir(root), PathBuf::from("/project/temp"));
        assert_eq!(paths.progress_dir(root), PathBuf::from("/project/progress"));
    }
}
