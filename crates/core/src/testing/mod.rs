//! Testing utilities and mock implementations.
//!
//! This module provides a mock [`CommandRunner`](crate::executor::CommandRunner)
//! and fixtures that stand in for the downloader and transcoder, allowing
//! whole conversion jobs to run without network access or real binaries.
//!
//! # Example
//!
//! ```rust,ignore
//! use audiograb_core::testing::{fixtures, MockCommandRunner};
//!
//! let tools = fixtures::FakeMediaTools::new(fixtures::playlist_json("Mix", &[("a", "One"), ("b", "Two")]))
//!     .failing_url(fixtures::watch_url("b"));
//! let runner = MockCommandRunner::with_handler(tools.handler());
//! ```

mod mock_runner;

pub use mock_runner::{MockCommandRunner, MockHandler, MockReply, RecordedCall};

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::path::{Path, PathBuf};
    use std::sync::Arc;

    use super::{MockHandler, MockReply};
    use crate::executor::ExecutionRequest;
    use crate::platform::{OsFamily, Platform, BIN_DIR_NAME};

    /// A platform rooted at `root` with an empty search path and no common
    /// installation directories, so only `<root>/bin` can satisfy lookups.
    pub fn isolated_platform(root: &Path) -> Arc<Platform> {
        Arc::new(
            Platform::builder(OsFamily::current(), root)
                .var("PATH", "")
                .install_dirs(Vec::new())
                .build(),
        )
    }

    /// Writes an executable placeholder file.
    pub fn write_executable(path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, "#!/bin/sh\nexit 0\n")?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))?;
        }
        Ok(())
    }

    /// Places downloader and transcoder placeholders in the project binary
    /// directory under their platform-specific names.
    pub fn install_fake_binaries(platform: &Platform) -> std::io::Result<Vec<PathBuf>> {
        let bin_dir = platform.project_root().join(BIN_DIR_NAME);
        ["yt-dlp", "ffmpeg"]
            .iter()
            .map(|name| {
                let path = bin_dir.join(platform.platform_specific_name(name));
                write_executable(&path).map(|()| path)
            })
            .collect()
    }

    pub fn watch_url(id: &str) -> String {
        format!("https://www.youtube.com/watch?v={}", id)
    }

    /// Downloader metadata for a single video.
    pub fn video_json(id: &str, title: &str, duration_secs: f64) -> String {
        serde_json::json!({
            "_type": "video",
            "id": id,
            "title": title,
            "webpage_url": watch_url(id),
            "duration": duration_secs,
        })
        .to_string()
    }

    /// Downloader metadata for a flat playlist of `(id, title)` entries.
    pub fn playlist_json(title: &str, entries: &[(&str, &str)]) -> String {
        let entries: Vec<serde_json::Value> = entries
            .iter()
            .map(|(id, title)| {
                serde_json::json!({
                    "_type": "url",
                    "id": id,
                    "title": title,
                    "url": watch_url(id),
                    "duration": 2.0,
                })
            })
            .collect();
        serde_json::json!({
            "_type": "playlist",
            "id": "PLtest",
            "title": title,
            "entries": entries,
        })
        .to_string()
    }

    /// Scripted stand-ins for the downloader and transcoder.
    ///
    /// Metadata runs answer with the configured JSON. Download runs write
    /// `source.webm` where the `-o` template points and print progress
    /// lines. Transcode runs write their last argument and print
    /// `-progress` lines.
    #[derive(Debug, Clone)]
    pub struct FakeMediaTools {
        metadata_json: String,
        failing_urls: Vec<String>,
        failing_transcode: bool,
    }

    impl FakeMediaTools {
        pub fn new(metadata_json: impl Into<String>) -> Self {
            Self {
                metadata_json: metadata_json.into(),
                failing_urls: Vec::new(),
                failing_transcode: false,
            }
        }

        /// Makes the download of `url` fail.
        pub fn failing_url(mut self, url: impl Into<String>) -> Self {
            self.failing_urls.push(url.into());
            self
        }

        /// Makes every transcode fail.
        pub fn failing_transcode(mut self) -> Self {
            self.failing_transcode = true;
            self
        }

        pub fn handler(self) -> MockHandler {
            Arc::new(move |request: &ExecutionRequest| self.reply(request))
        }

        fn reply(&self, request: &ExecutionRequest) -> MockReply {
            let binary = request.binary_name();
            let args = request.arguments();

            if binary.starts_with("yt-dlp") {
                if args.iter().any(|a| a == "--dump-single-json") {
                    return MockReply::success(self.metadata_json.clone());
                }
                let url = args.last().cloned().unwrap_or_default();
                if self.failing_urls.contains(&url) {
                    return MockReply::failure(
                        1,
                        format!("ERROR: [youtube] {}: Video unavailable", url),
                    );
                }
                let Some(template) = arg_after(args, "-o") else {
                    return MockReply::failure(2, "missing -o");
                };
                let target = template.replace("%(ext)s", "webm");
                if let Err(e) = std::fs::write(&target, b"fake source audio") {
                    return MockReply::failure(1, format!("ERROR: unable to write {}: {}", target, e));
                }
                return MockReply::success(
                    "[youtube] Extracting URL\n[download]  25.0% of 1.00MiB\n[download]  75.5% of 1.00MiB\n[download] 100% of 1.00MiB in 00:00:01\n",
                );
            }

            if binary.starts_with("ffmpeg") {
                if self.failing_transcode {
                    return MockReply::failure(1, "Conversion failed!");
                }
                let Some(output) = args.last() else {
                    return MockReply::failure(1, "missing output");
                };
                if let Err(e) = std::fs::write(output, b"fake encoded audio") {
                    return MockReply::failure(1, format!("{}: {}", output, e));
                }
                return MockReply::success(
                    "out_time_ms=1000000\nprogress=continue\nout_time_ms=2000000\nprogress=end\n",
                );
            }

            MockReply::failure(127, format!("{}: command not found", binary))
        }
    }

    fn arg_after<'a>(args: &'a [String], flag: &str) -> Option<&'a String> {
        args.iter()
            .position(|a| a == flag)
            .and_then(|idx| args.get(idx + 1))
    }
}
