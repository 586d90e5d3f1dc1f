//! Cache configuration.
//!
//! Controls the request cache via the `[cache]` section of `novella.toml`.

use std::time::Duration;

use serde::Deserialize;

/// Five minutes, the API client default.
const DEFAULT_TTL_MS: u64 = 5 * 60 * 1000;

/// Request cache configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Serve and store results. When off, calls are only deduplicated.
    pub enabled: bool,
    /// TTL applied when a fetch does not name one.
    pub default_ttl_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            default_ttl_ms: DEFAULT_TTL_MS,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            enabled: settings.enabled,
            default_ttl_ms: settings.default_ttl.as_millis() as u64,
        }
    }
}

impl CacheConfig {
    /// Default TTL as a `Duration`, clamped to at least one millisecond.
    pub fn default_ttl(&self) -> Duration {
        Duration::from_millis(self.default_ttl_ms.max(1))
    }
}
