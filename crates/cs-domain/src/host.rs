//! Hostname extraction from navigation targets.

use cs_config::normalize_domain;
use url::Url;

/// Extracts the normalized hostname of `url`.
///
/// Returns `None` for unparseable input, URLs that cannot carry a host
/// (`about:blank`, `javascript:`, `data:`) and empty hosts.
pub fn hostname_of(url: &str) -> Option<String> {
    let parsed = Url::parse(url.trim()).ok()?;
    let host = parsed.host_str()?;
    // IPv6 literals come back bracketed; keep them as-is for matching.
    let normalized = normalize_domain(host);
    if normalized.is_empty() {
        return None;
    }
    Some(normalized)
}

/// True if both URLs parse and share the same hostname.
pub fn same_host(left: &str, right: &str) -> bool {
    match (hostname_of(left), hostname_of(right)) {
        (Some(left), Some(right)) => left == right,
        _ => false,
    }
}
