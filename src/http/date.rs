//! HTTP-date handling for `Expires` headers and log timestamps.

use crate::error::ProxyError;
use std::time::SystemTime;

/// Parse an IMF-fixdate style HTTP date ("Sun, 06 Nov 1994 08:49:37 GMT"),
/// interpreted as UTC. A trailing `UTC` marker is accepted as a synonym
/// for `GMT`.
pub fn parse_http_date(value: &str) -> Result<SystemTime, ProxyError> {
    let trimmed = value.trim();
    let normalized = match trimmed.strip_suffix("UTC") {
        Some(rest) => format!("{}GMT", rest),
        None => trimmed.to_string(),
    };
    httpdate::parse_http_date(&normalized)
        .map_err(|e| ProxyError::Malformed(format!("invalid HTTP date {:?}: {}", value, e)))
}

/// Format an instant as an IMF-fixdate string for headers and log lines.
pub fn format_http_date(at: SystemTime) -> String {
    httpdate::fmt_http_date(at)
}
