//! Installation guidance rendered into resolution failures.

use super::types::{OsFamily, Platform};

/// Renders platform-specific installation steps for a binary.
pub fn install_guidance(name: &str, platform: &Platform) -> String {
    let bin_dir = platform.bin_dir();
    let file_name = if platform.os().is_windows() {
        platform.platform_specific_name(name)
    } else {
        name.to_string()
    };

    let mut steps = Vec::new();

    steps.push(match manual_download_url(name, platform.os()) {
        Some(url) => format!(
            "Download {} from {} and place it at {}",
            name,
            url,
            bin_dir.join(&file_name).display()
        ),
        None => format!(
            "Place the {} executable at {}",
            name,
            bin_dir.join(&file_name).display()
        ),
    });

    steps.push(system_install_command(name, platform.os()));

    if let Some(cmd) = ecosystem_install_command(name) {
        steps.push(cmd.to_string());
    }

    if !platform.os().is_windows() {
        steps.push(format!(
            "Make sure the file is executable: chmod +x {}",
            bin_dir.join(&file_name).display()
        ));
    }

    let mut out = format!("How to install {}:\n", name);
    for (idx, step) in steps.iter().enumerate() {
        out.push_str(&format!("  {}. {}\n", idx + 1, step));
    }
    out
}

/// Remediation for a binary that exists but cannot be executed.
pub fn not_executable_hint(path: &std::path::Path, os: OsFamily) -> String {
    match os {
        OsFamily::Windows => format!(
            "Ensure {} has an executable extension (.exe, .cmd, .bat) and is not blocked \
             (file Properties > Unblock)",
            path.display()
        ),
        OsFamily::MacOs => format!(
            "Run: chmod +x {0} && xattr -d com.apple.quarantine {0}",
            path.display()
        ),
        OsFamily::Linux | OsFamily::Unknown => format!("Run: chmod +x {}", path.display()),
    }
}

fn manual_download_url(name: &str, os: OsFamily) -> Option<&'static str> {
    match (name, os) {
        ("yt-dlp", _) => Some("https://github.com/yt-dlp/yt-dlp/releases/latest"),
        ("ffmpeg" | "ffprobe", OsFamily::Windows) => {
            Some("https://github.com/BtbN/FFmpeg-Builds/releases")
        }
        ("ffmpeg" | "ffprobe", _) => Some("https://ffmpeg.org/download.html"),
        _ => None,
    }
}

fn system_install_command(name: &str, os: OsFamily) -> String {
    match (name, os) {
        ("yt-dlp", OsFamily::Windows) => "System-wide: winget install yt-dlp.yt-dlp".to_string(),
        ("ffmpeg" | "ffprobe", OsFamily::Windows) => {
            "System-wide: winget install Gyan.FFmpeg (or: choco install ffmpeg)".to_string()
        }
        (_, OsFamily::Windows) => format!(
            "System-wide: install {} with winget or chocolatey and make sure it is on PATH",
            name
        ),
        ("ffprobe", OsFamily::MacOs) => "System-wide: brew install ffmpeg".to_string(),
        (_, OsFamily::MacOs) => format!("System-wide: brew install {}", name),
        ("ffprobe", _) => {
            "System-wide: sudo apt install ffmpeg (or your distribution's package manager)"
                .to_string()
        }
        (_, _) => format!(
            "System-wide: sudo apt install {} (or your distribution's package manager)",
            name
        ),
    }
}

fn ecosystem_install_command(name: &str) -> Option<&'static str> {
    match name {
        "yt-dlp" => Some("Python: pip install -U yt-dlp"),
        "ffmpeg" | "ffprobe" => Some("Conda: conda install -c conda-forge ffmpeg"),
        _ => None,
    }
}
