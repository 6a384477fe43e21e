//! Proxy engine: per-method dispatch, cache consultation, origin
//! forwarding, and the store/pass-through decision for upstream responses.

use crate::access_log::AccessLog;
use crate::cache::{CacheStore, Lookup};
use crate::error::ProxyError;
use crate::framing;
use crate::http::codec;
use crate::http::{Request, Response};
use crate::upstream;
use bytes::Bytes;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;

/// Literal wire replies for the short-circuit paths, with the status lines
/// the access log records for them.
pub const BAD_REQUEST: &[u8] = b"HTTP/1.1 400 Bad Request\r\n\r\n";
pub const BAD_REQUEST_LINE: &str = "HTTP/1.1 400 Bad Request";
pub const BAD_GATEWAY: &[u8] = b"HTTP/1.1 502 Bad Gateway\r\n\r\n";
pub const BAD_GATEWAY_LINE: &str = "HTTP/1.1 502 Bad Gateway";
pub const NOT_IMPLEMENTED: &[u8] = b"HTTP/1.1 501 Not Implemented\r\n\r\n";
pub const NOT_IMPLEMENTED_LINE: &str = "HTTP/1.1 501 Not Implemented";
pub const CONNECT_ESTABLISHED_LINE: &str = "HTTP/1.1 200 Connection Established";

/// Default origin port for plain HTTP forwarding.
const HTTP_PORT: u16 = 80;

/// Cache key: `Host` header value verbatim (port included, `"unknown"`
/// when absent) joined with the request target.
pub fn cache_key(req: &Request) -> String {
    format!("{}|{}", req.host(), req.target)
}

/// The establishment reply written to the client before a CONNECT tunnel
/// starts.
pub fn connect_established() -> Bytes {
    Bytes::from(format!(
        "{}\r\nProxy-Agent: {}/{}\r\n\r\n",
        CONNECT_ESTABLISHED_LINE,
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
    ))
}

pub struct ProxyEngine {
    cache: Arc<CacheStore>,
    log: Arc<AccessLog>,
}

impl ProxyEngine {
    pub fn new(cache: Arc<CacheStore>, log: Arc<AccessLog>) -> Self {
        Self { cache, log }
    }

    /// GET: serve from cache when valid; otherwise forward to the origin —
    /// conditionally when an expired or revalidate-flagged entry is on
    /// hand — and decide storability of what comes back.
    pub async fn handle_get(&self, req: &Request, id: u64) -> Bytes {
        let key = cache_key(req);

        let cached = match self.cache.fetch(&key) {
            Lookup::Miss => {
                self.log.cache_miss(id);
                None
            }
            Lookup::Valid(entry) => {
                self.log.cache_valid(id);
                self.log.responding(id, &entry.response.status_line());
                return codec::serialize_response(&entry.response);
            }
            Lookup::Expired(entry) => {
                self.log.cache_expired(id, &entry.expires_string());
                Some(entry)
            }
            Lookup::Revalidate(entry) => {
                self.log.cache_revalidate(id);
                Some(entry)
            }
        };

        let extra_headers = match &cached {
            Some(entry) if !entry.etag.is_empty() => format!("If-None-Match: {}\r\n", entry.etag),
            _ => String::new(),
        };

        let response = match self.forward(req, id, &extra_headers).await {
            Ok(response) => response,
            Err(e) => {
                self.log.error(id, &format!("upstream failure: {}", e));
                self.log.responding(id, BAD_GATEWAY_LINE);
                return Bytes::from_static(BAD_GATEWAY);
            }
        };

        // A 304 answer to a conditional request refreshes the cached entry
        // and serves the merged copy; the 304 status line itself is never
        // forwarded to the client.
        if response.status == 304 {
            if let Some(entry) = cached {
                self.cache.update_headers(&key, &response);
                let refreshed = match self.cache.fetch(&key) {
                    Lookup::Valid(e) | Lookup::Expired(e) | Lookup::Revalidate(e) => e.response,
                    // Evicted between the merge and the re-fetch.
                    Lookup::Miss => entry.response,
                };
                self.log.note(id, "304 Not Modified -> Using Old");
                self.log.responding(id, &refreshed.status_line());
                return codec::serialize_response(&refreshed);
            }
        }

        if response.status == 200 {
            self.store_decision(&key, &response, id);
        }

        self.log.responding(id, &response.status_line());
        codec::serialize_response(&response)
    }

    /// POST: forward verbatim, never consult or populate the cache.
    pub async fn handle_post(&self, req: &Request, id: u64) -> Bytes {
        match self.forward(req, id, "").await {
            Ok(response) => {
                self.log.responding(id, &response.status_line());
                codec::serialize_response(&response)
            }
            Err(e) => {
                self.log.error(id, &format!("upstream failure: {}", e));
                self.log.responding(id, BAD_GATEWAY_LINE);
                Bytes::from_static(BAD_GATEWAY)
            }
        }
    }

    /// Serialize the request to the origin named by its `Host` header and
    /// read back one framed response.
    async fn forward(&self, req: &Request, id: u64, extra_headers: &str) -> Result<Response, ProxyError> {
        let server = req.host();
        let (host, port) = upstream::split_host_port(server, HTTP_PORT);

        self.log.requesting(id, &req.request_line(), server);
        let mut origin = upstream::connect(&host, port).await?;
        origin
            .write_all(&codec::serialize_request(req, extra_headers))
            .await?;
        let response = framing::read_response(&mut origin).await?;
        self.log.received(id, &response.status_line(), server);
        Ok(response)
    }

    /// Storability of a fresh 200: the engine short-circuits
    /// `no-store`/`private` itself to name the precise reason, otherwise
    /// hands the response to the store and logs how it was kept.
    fn store_decision(&self, key: &str, response: &Response, id: u64) {
        if let Some(cache_control) = response.header("Cache-Control") {
            let reason = if cache_control.contains("no-store") {
                Some("Cache-Control: no-store")
            } else if cache_control.contains("private") {
                Some("Cache-Control: private")
            } else {
                None
            };
            if let Some(reason) = reason {
                self.log.not_cacheable(id, reason);
                return;
            }
            if cache_control.contains("must-revalidate") {
                self.log.note(id, "Cache-Control: must-revalidate");
            }
        }
        if let Some(etag) = response.header("ETag") {
            self.log.note(id, &format!("ETag: {}", etag));
        }

        self.cache.store(key, response);
        match self.cache.fetch(key) {
            Lookup::Revalidate(_) => self.log.cached_revalidate(id),
            Lookup::Valid(entry) | Lookup::Expired(entry) => {
                self.log.cached_expires(id, &entry.expires_string());
            }
            // The store refused or a concurrent burst already evicted the
            // key; the store's own diagnostics cover it.
            Lookup::Miss => {}
        }
    }
}
