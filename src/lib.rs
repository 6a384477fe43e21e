//! HTTP/1.1 caching forward proxy.
//!
//! Clients send plain GET/POST requests or CONNECT tunnel requests at the
//! proxy; it relays to origin servers, caches storable responses in a
//! bounded in-memory LRU, revalidates expired entries with conditional
//! requests, and relays opaque bytes for CONNECT tunnels.

pub mod access_log;
pub mod cache;
pub mod config;
pub mod error;
pub mod framing;
pub mod http;
pub mod proxy;
pub mod server;
pub mod upstream;
