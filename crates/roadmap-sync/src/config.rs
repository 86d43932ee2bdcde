//! Sync configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default API root of the roadmap backend
pub const DEFAULT_API_URL: &str = "http://localhost:3001/api";

/// Environment variable overriding the API root
pub const ENV_API_URL: &str = "ROADMAP_API_URL";
/// Environment variable overriding the request timeout (seconds)
pub const ENV_TIMEOUT_SECS: &str = "ROADMAP_TIMEOUT_SECS";
/// Environment variable overriding the cache file location
pub const ENV_CACHE_PATH: &str = "ROADMAP_CACHE_PATH";

/// Sync configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Base URL of the REST API
    pub api_url: String,
    /// Per-request timeout
    pub request_timeout: Duration,
    /// File backing the local cache
    pub cache_path: PathBuf,
}

impl SyncConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden by any `ROADMAP_*` variables that are set
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`SyncConfig::from_env`] with an injectable lookup
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(url) = lookup(ENV_API_URL).filter(|v| !v.trim().is_empty()) {
            config.api_url = url;
        }
        match lookup(ENV_TIMEOUT_SECS).map(|v| v.parse::<u64>()) {
            Some(Ok(secs)) if secs > 0 => config.request_timeout = Duration::from_secs(secs),
            Some(_) => tracing::warn!(var = ENV_TIMEOUT_SECS, "ignoring invalid timeout"),
            None => {}
        }
        if let Some(path) = lookup(ENV_CACHE_PATH).filter(|v| !v.trim().is_empty()) {
            config.cache_path = PathBuf::from(path);
        }
        config
    }

    /// With API root
    #[inline]
    #[must_use]
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    /// With request timeout
    #[inline]
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// With cache file
    #[inline]
    #[must_use]
    pub fn with_cache_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_path = path.into();
        self
    }

    /// API root without a trailing slash
    #[must_use]
    pub fn api_root(&self) -> &str {
        self.api_url.trim_end_matches('/')
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            request_timeout: Duration::from_secs(10),
            cache_path: PathBuf::from("roadmap-cache.json"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults() {
        let config = SyncConfig::new();
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.request_timeout, Duration::from_secs(10));
    }

    #[test]
    fn lookup_overrides() {
        let env: HashMap<&str, &str> = [
            (ENV_API_URL, "https://roadmap.example/api/"),
            (ENV_TIMEOUT_SECS, "3"),
            (ENV_CACHE_PATH, "/tmp/cache.json"),
        ]
        .into_iter()
        .collect();
        let config = SyncConfig::from_lookup(|k| env.get(k).map(|v| (*v).to_string()));

        assert_eq!(config.api_root(), "https://roadmap.example/api");
        assert_eq!(config.request_timeout, Duration::from_secs(3));
        assert_eq!(config.cache_path, PathBuf::from("/tmp/cache.json"));
    }

    #[test]
    fn invalid_timeout_keeps_default() {
        let config = SyncConfig::from_lookup(|k| (k == ENV_TIMEOUT_SECS).then(|| "soon".to_string()));
        assert_eq!(config.request_timeout, Duration::from_secs(10));
    }
}
