//! Actionable hints for common failure output.

/// Substring patterns (lowercase) and the hint appended after a matching line.
const HINTS: &[(&[&str], &str)] = &[
    (
        &["command not found", "not recognized"],
        "hint: a required program is missing; install it or add its directory to PATH",
    ),
    (
        &["permission denied", "access is denied"],
        "hint: check file permissions (chmod +x on the binary, write access to the target directory)",
    ),
    (
        &["no such file or directory"],
        "hint: a referenced file or directory does not exist; check the paths and working directory",
    ),
    (
        &[
            "unable to download",
            "unable to connect",
            "connection refused",
            "connection reset",
            "network is unreachable",
            "name or service not known",
            "getaddrinfo failed",
            "temporary failure in name resolution",
            "ssl",
            "http error",
            "timed out",
        ],
        "hint: network problem; check your connection or proxy settings and retry",
    ),
];

/// Appends a one-line hint after each line of `stderr` that matches a known
/// failure pattern. Original lines keep their order and content.
pub fn annotate_stderr(stderr: &str) -> String {
    let default_eol = if stderr.contains("\r\n") { "\r\n" } else { "\n" };
    let mut out = String::with_capacity(stderr.len());
    for line in stderr.split_inclusive('\n') {
        out.push_str(line);
        let content = line.trim_end_matches(['\n', '\r']);
        let Some(hint) = hint_for(content) else {
            continue;
        };
        if line.ends_with('\n') {
            let eol = if line.ends_with("\r\n") { "\r\n" } else { "\n" };
            out.push_str("  ");
            out.push_str(hint);
            out.push_str(eol);
        } else {
            out.push_str(default_eol);
            out.push_str("  ");
            out.push_str(hint);
        }
    }
    out
}

fn hint_for(line: &str) -> Option<&'static str> {
    let lower = line.to_ascii_lowercase();
    HINTS
        .iter()
        .find(|(patterns, _)| patterns.iter().any(|p| lower.contains(p)))
        .map(|(_, hint)| *hint)
}
