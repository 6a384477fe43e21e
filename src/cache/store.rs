//! Process-wide bounded LRU store mapping `host + "|" + url` keys to
//! cached responses. Reads dominate, so one reader/writer lock guards the
//! whole structure: lookups copy the entry out under the shared lock and
//! reposition it under the exclusive lock afterwards.

use super::entry::CacheEntry;
use super::policy;
use crate::http::Response;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::RwLock;
use std::time::SystemTime;

/// Entries kept when no capacity is configured.
pub const DEFAULT_CAPACITY: usize = 10;

/// Outcome of a cache lookup. Expired and revalidate hits still carry the
/// entry so the caller can log its expiry and revalidate conditionally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Miss,
    Valid(CacheEntry),
    Expired(CacheEntry),
    Revalidate(CacheEntry),
}

pub struct CacheStore {
    entries: RwLock<LruCache<String, CacheEntry>>,
}

impl Default for CacheStore {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl CacheStore {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: RwLock::new(LruCache::new(capacity)),
        }
    }

    /// Two-phase lookup: copy the entry under the shared lock, then move
    /// the key to the LRU front under the exclusive lock. The entry may be
    /// evicted between the phases, in which case the move is a no-op.
    pub fn fetch(&self, key: &str) -> Lookup {
        let entry = {
            let guard = match self.entries.read() {
                Ok(guard) => guard,
                Err(_) => {
                    tracing::error!("cache: read lock poisoned, treating fetch as a miss, key={}", key);
                    return Lookup::Miss;
                }
            };
            match guard.peek(key) {
                Some(entry) => entry.clone(),
                None => return Lookup::Miss,
            }
        };

        match self.entries.write() {
            Ok(mut guard) => guard.promote(key),
            Err(_) => tracing::error!("cache: write lock poisoned, skipping LRU update, key={}", key),
        }

        if entry.is_expired() {
            Lookup::Expired(entry)
        } else if entry.must_revalidate {
            Lookup::Revalidate(entry)
        } else {
            Lookup::Valid(entry)
        }
    }

    /// Store a 200 response under `key`. Non-200 responses are ignored;
    /// `no-store`/`private` responses are skipped. New keys insert at the
    /// LRU front, existing keys are overwritten and moved there, and the
    /// tail is evicted when the capacity overflows — all under one
    /// exclusive lock.
    pub fn store(&self, key: &str, response: &Response) {
        if response.status != 200 {
            return;
        }

        let policy = match policy::evaluate(&response.headers, SystemTime::now()) {
            Ok(policy) => policy,
            Err(reason) => {
                tracing::debug!("cache: store skipped, key={}, reason={}", key, reason);
                return;
            }
        };

        let entry = CacheEntry {
            expires_at: policy.expires_at,
            must_revalidate: policy.must_revalidate,
            etag: response.header("ETag").unwrap_or_default().to_string(),
            response: identity_framed(response),
        };

        match self.entries.write() {
            Ok(mut guard) => {
                guard.put(key.to_string(), entry);
            }
            Err(_) => tracing::error!("cache: write lock poisoned, store aborted, key={}", key),
        }
    }

    /// Merge the headers of a `304 Not Modified` into the stored entry
    /// (new values overwrite), refresh its ETag, and re-derive its expiry
    /// from the merged headers. A missing key is a no-op; merged headers
    /// that now signal non-cacheable leave the entry's policy untouched.
    pub fn update_headers(&self, key: &str, fresh: &Response) {
        let mut guard = match self.entries.write() {
            Ok(guard) => guard,
            Err(_) => {
                tracing::error!("cache: write lock poisoned, header update aborted, key={}", key);
                return;
            }
        };
        let Some(entry) = guard.peek_mut(key) else {
            return;
        };

        for (name, value) in &fresh.headers {
            entry.response.headers.insert(name.clone(), value.clone());
        }
        if let Some(etag) = fresh.header("ETag") {
            entry.etag = etag.to_string();
        }

        match policy::evaluate(&entry.response.headers, SystemTime::now()) {
            Ok(policy) => {
                entry.expires_at = policy.expires_at;
                entry.must_revalidate = policy.must_revalidate;
            }
            Err(reason) => {
                tracing::warn!("cache: keeping stale policy after 304 merge, key={}, reason={}", key, reason);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|guard| guard.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Normalize the stored copy to identity framing: chunked transfer
/// encoding dropped, `Content-Length` matching the decoded body.
fn identity_framed(response: &Response) -> Response {
    let mut stored = response.clone();
    if stored.is_chunked() {
        stored.headers.remove("Transfer-Encoding");
    }
    stored
        .headers
        .insert("Content-Length".to_string(), stored.body.len().to_string());
    stored
}
