//! Engine client configuration.

use serde::Deserialize;
use std::time::Duration;

/// Header carrying the engine API key unless configured otherwise.
pub const DEFAULT_API_KEY_HEADER: &str = "X-N8N-API-KEY";

/// Connection settings for the execution engine.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Base URL of the engine's REST API, e.g. `http://localhost:5678/api/v1`.
    pub base_url: String,
    /// API key sent with every request.
    #[serde(default)]
    pub api_key: String,
    /// Name of the header that carries the API key.
    #[serde(default = "default_api_key_header")]
    pub api_key_header: String,
    /// Timeout for regular requests, in seconds.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    /// Timeout for health checks, in seconds.
    #[serde(default = "default_health_timeout_seconds")]
    pub health_timeout_seconds: u64,
}

fn default_api_key_header() -> String {
    DEFAULT_API_KEY_HEADER.to_string()
}

fn default_timeout_seconds() -> u64 {
    30
}

fn default_health_timeout_seconds() -> u64 {
    5
}

impl EngineConfig {
    /// Creates a configuration with default header and timeouts.
    #[must_use]
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            api_key_header: default_api_key_header(),
            timeout_seconds: default_timeout_seconds(),
            health_timeout_seconds: default_health_timeout_seconds(),
        }
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    #[must_use]
    pub fn health_timeout(&self) -> Duration {
        Duration::from_secs(self.health_timeout_seconds)
    }

    /// Builds the URL for an API path such as `/workflows`.
    #[must_use]
    pub fn api_url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url.trim_end_matches('/'))
    }

    /// Health endpoint: `/healthz` on the base URL minus its `/api/vN` suffix.
    #[must_use]
    pub fn health_url(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        let root = base
            .rsplit_once('/')
            .filter(|(_, last)| is_version_segment(last))
            .map(|(rest, _)| rest.strip_suffix("/api").unwrap_or(rest))
            .unwrap_or(base);
        format!("{root}/healthz")
    }
}

fn is_version_segment(segment: &str) -> bool {
    segment
        .strip_prefix('v')
        .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
}
