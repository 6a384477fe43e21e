use crate::http::date;
use crate::http::Response;
use std::time::SystemTime;

/// A cached response plus the metadata the policy engine needs. Pure value
/// type; the store clones entries out rather than handing out references.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub expires_at: SystemTime,
    pub must_revalidate: bool,
    /// Entity tag, empty when the origin sent none.
    pub etag: String,
    /// Stored in identity framing: body decoded, `Content-Length` set,
    /// `Transfer-Encoding` absent.
    pub response: Response,
}

impl CacheEntry {
    pub fn is_expired(&self) -> bool {
        SystemTime::now() > self.expires_at
    }

    /// Expiry formatted for log lines.
    pub fn expires_string(&self) -> String {
        date::format_http_date(self.expires_at)
    }
}
