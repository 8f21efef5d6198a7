//! Source reference validation.

use url::Url;

use super::error::PipelineError;

/// Validates a source reference before any process work happens.
///
/// The reference must be an absolute `http`/`https` URL whose host is one
/// of `allowed_hosts` or a subdomain of one.
pub fn validate_reference(raw: &str, allowed_hosts: &[String]) -> Result<Url, PipelineError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(PipelineError::invalid_reference(raw, "reference is empty"));
    }
    if trimmed.chars().any(char::is_whitespace) {
        return Err(PipelineError::invalid_reference(
            raw,
            "reference must not contain whitespace",
        ));
    }

    let url = Url::parse(trimmed)
        .map_err(|e| PipelineError::invalid_reference(raw, format!("not a valid URL ({})", e)))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(PipelineError::invalid_reference(
            raw,
            format!("unsupported scheme '{}'", url.scheme()),
        ));
    }

    let host = url
        .host_str()
        .map(|h| h.trim_end_matches('.').to_ascii_lowercase())
        .ok_or_else(|| PipelineError::invalid_reference(raw, "URL has no host"))?;

    if !host_allowed(&host, allowed_hosts) {
        return Err(PipelineError::invalid_reference(
            raw,
            format!(
                "host '{}' is not supported (allowed: {})",
                host,
                allowed_hosts.join(", ")
            ),
        ));
    }

    Ok(url)
}

fn host_allowed(host: &str, allowed_hosts: &[String]) -> bool {
    allowed_hosts.iter().any(|allowed| {
        let allowed = allowed.trim().trim_start_matches('.').to_ascii_lowercase();
        !allowed.is_empty()
            && (host == allowed
                || host
                    .strip_suffix(allowed.as_str())
                    .is_some_and(|prefix| prefix.ends_with('.')))
    })
}
