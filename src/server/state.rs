use crate::access_log::AccessLog;
use crate::cache::CacheStore;
use crate::config::ProxyConfig;
use crate::proxy::ProxyEngine;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Process-wide shared state handed to every connection task: the cache
/// store, the access log, and the request-id counter.
pub struct ProxyState {
    pub config: ProxyConfig,
    pub cache: Arc<CacheStore>,
    pub access_log: Arc<AccessLog>,
    request_ids: AtomicU64,
}

impl ProxyState {
    pub fn new(config: ProxyConfig, access_log: Arc<AccessLog>) -> Arc<Self> {
        let cache = Arc::new(CacheStore::new(config.cache_entries));
        Arc::new(Self {
            config,
            cache,
            access_log,
            request_ids: AtomicU64::new(1),
        })
    }

    /// Unique, monotonically increasing id assigned to each client
    /// connection. Ids interleave across concurrent connections.
    pub fn next_request_id(&self) -> u64 {
        self.request_ids.fetch_add(1, Ordering::Relaxed)
    }

    pub fn engine(&self) -> ProxyEngine {
        ProxyEngine::new(self.cache.clone(), self.access_log.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_ids_are_unique_and_increasing() {
        let state = ProxyState::new(ProxyConfig::default(), Arc::new(AccessLog::stdout()));
        let first = state.next_request_id();
        let second = state.next_request_id();
        assert!(second > first);
    }
}
