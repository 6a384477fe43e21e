pub mod codec;
pub mod date;

use bytes::Bytes;
use std::collections::BTreeMap;

/// Header map: name → value. Names are case-sensitive and duplicate names
/// overwrite on parse (last wins). Multi-valued headers such as
/// `Set-Cookie` therefore collapse to their last value — a known
/// limitation of the wire format this proxy speaks.
pub type Headers = BTreeMap<String, String>;

/// One client request. Built by the stream framing layer, immutable
/// afterwards, dropped with the connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: String,
    /// Request target: `host[:port]` for CONNECT, an absolute-form URL or
    /// origin-form path otherwise.
    pub target: String,
    pub version: String,
    pub headers: Headers,
    pub body: Bytes,
}

impl Request {
    /// The start line as it appeared on the wire, for log lines.
    pub fn request_line(&self) -> String {
        format!("{} {} {}", self.method, self.target, self.version)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    /// `Host` header value verbatim (port included), or the `"unknown"`
    /// sentinel when the client sent none. Cache keys and upstream log
    /// lines use this.
    pub fn host(&self) -> &str {
        self.header("Host").unwrap_or("unknown")
    }
}

/// One origin response, or a cached copy of one. The body is already
/// dechunked when the wire used chunked encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub version: String,
    pub status: u16,
    pub reason: String,
    pub headers: Headers,
    pub body: Bytes,
}

impl Response {
    pub fn status_line(&self) -> String {
        format!("{} {} {}", self.version, self.status, self.reason)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    /// Whether the response still carries a chunked `Transfer-Encoding`
    /// header from its time on the wire.
    pub fn is_chunked(&self) -> bool {
        self.header("Transfer-Encoding")
            .map(|v| v.trim().eq_ignore_ascii_case("chunked"))
            .unwrap_or(false)
    }
}
