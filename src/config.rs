//! Proxy configuration: optional TOML/JSON file, environment overrides,
//! CLI flags on top.

use anyhow::Result;
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const DEFAULT_PORT: u16 = 12345;
pub const DEFAULT_WORKERS: usize = 4;
pub const DEFAULT_CACHE_ENTRIES: usize = 10;
const DEFAULT_LOG_FILE: &str = "/var/log/iris-proxy/proxy.log";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listening port, bound on all interfaces. Port 0 binds an ephemeral
    /// port.
    pub port: u16,
    /// Worker threads in the runtime; each client connection is handled
    /// end-to-end on this pool.
    pub workers: usize,
    /// Cache capacity in entries.
    pub cache_entries: usize,
    /// Access-log destination.
    pub log_file: PathBuf,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            workers: DEFAULT_WORKERS,
            cache_entries: DEFAULT_CACHE_ENTRIES,
            log_file: PathBuf::from(DEFAULT_LOG_FILE),
        }
    }
}

impl ProxyConfig {
    /// Load configuration from a file (if it exists) and apply environment
    /// variable overrides. A missing file means built-in defaults, so the
    /// proxy starts with zero configuration.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config: ProxyConfig = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            match path.extension().and_then(|e| e.to_str()) {
                Some("toml") => toml::from_str(&content)?,
                Some("json") => serde_json::from_str(&content)?,
                Some(ext) => anyhow::bail!("unsupported config format: .{ext}, use .toml or .json"),
                None => anyhow::bail!("config file has no extension, use .toml or .json"),
            }
        } else {
            ProxyConfig::default()
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("IRIS_PORT") {
            if let Ok(n) = v.parse() {
                self.port = n;
            }
        }
        if let Ok(v) = std::env::var("IRIS_WORKERS") {
            if let Ok(n) = v.parse() {
                self.workers = n;
            }
        }
        if let Ok(v) = std::env::var("IRIS_CACHE_ENTRIES") {
            if let Ok(n) = v.parse() {
                self.cache_entries = n;
            }
        }
        if let Ok(v) = std::env::var("IRIS_LOG_FILE") {
            self.log_file = PathBuf::from(v);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            anyhow::bail!("workers must be at least 1");
        }
        if self.cache_entries == 0 {
            anyhow::bail!("cache_entries must be at least 1");
        }
        Ok(())
    }
}
