//! `Cache-Control` / `Expires` evaluation: decides whether a 200 may be
//! stored and when the stored copy expires.

use crate::http::date;
use crate::http::Headers;
use std::fmt;
use std::time::{Duration, SystemTime};

/// Expiry assigned when a storable response carries no cache headers.
pub const DEFAULT_TTL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    pub expires_at: SystemTime,
    pub must_revalidate: bool,
}

/// Why a 200 response may not be stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotCacheable {
    NoStore,
    Private,
}

impl NotCacheable {
    pub fn reason(self) -> &'static str {
        match self {
            NotCacheable::NoStore => "Cache-Control: no-store",
            NotCacheable::Private => "Cache-Control: private",
        }
    }
}

impl fmt::Display for NotCacheable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.reason())
    }
}

/// Compute expiry and the revalidation flag from response headers.
///
/// Precedence: the 60 s default, overridden by `max-age`, overridden by a
/// well-formed `Expires` that lies in the future. `no-store` and `private`
/// refuse storage outright; a malformed `Expires` is logged and ignored.
pub fn evaluate(headers: &Headers, now: SystemTime) -> Result<CachePolicy, NotCacheable> {
    let mut expires_at = now + DEFAULT_TTL;
    let mut must_revalidate = false;

    if let Some(cache_control) = headers.get("Cache-Control") {
        if cache_control.contains("no-store") {
            return Err(NotCacheable::NoStore);
        }
        if cache_control.contains("private") {
            return Err(NotCacheable::Private);
        }
        if cache_control.contains("must-revalidate") {
            must_revalidate = true;
        }
        if let Some(secs) = max_age(cache_control) {
            expires_at = now + Duration::from_secs(secs);
        }
    }

    if let Some(raw) = headers.get("Expires") {
        match date::parse_http_date(raw) {
            Ok(at) if at > now => expires_at = at,
            Ok(_) => {} // already in the past, keep the computed expiry
            Err(e) => {
                tracing::warn!("cache: ignoring malformed Expires header, value={:?}, error={}", raw, e);
            }
        }
    }

    Ok(CachePolicy { expires_at, must_revalidate })
}

/// Digits immediately following `max-age=`, or `None` when the directive
/// is absent or carries no digits.
fn max_age(cache_control: &str) -> Option<u64> {
    let at = cache_control.find("max-age=")? + "max-age=".len();
    let rest = &cache_control[at..];
    let end = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
    rest[..end].parse().ok()
}
