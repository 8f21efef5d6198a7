//! Platform detection and binary resolution.
//!
//! A [`Platform`] value describes the host (OS family, project root,
//! captured environment). A [`BinaryResolver`] turns logical names such as
//! `downloader` or `ffmpeg` into executable paths by trying, in order:
//!
//! 1. a caller-supplied custom path (literal, suffixed, stripped)
//! 2. the platform-specific name in `<project-root>/bin/`
//! 3. the bare name in `<project-root>/bin/`
//! 4. every entry of the search path
//! 5. well-known install directories for the platform
//!
//! # Example
//!
//! ```ignore
//! use audiograb_core::platform::{BinaryResolver, Platform};
//!
//! let resolver = BinaryResolver::new(Platform::current());
//! let ffmpeg = resolver.resolve("transcoder", None)?;
//! println!("{:?} ({:?})", ffmpeg.path(), ffmpeg.location());
//! ```

mod error;
mod guidance;
mod resolver;
mod types;

pub use error::ResolveError;
pub use guidance::{install_guidance, not_executable_hint};
pub use resolver::{canonical_name, Attempt, BinaryDescriptor, BinaryLocation, BinaryResolver, Strategy};
pub use types::{find_project_root, OsFamily, Platform, PlatformBuilder, BIN_DIR_NAME, PROJECT_MANIFESTS};
