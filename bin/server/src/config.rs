//! Centralized server configuration.
//!
//! This module provides strongly-typed configuration for the server,
//! loaded via the `config` crate from environment variables. Nested keys use
//! a double underscore: `ENGINE__BASE_URL`, `SYNC__INTERVAL_SECONDS`,
//! `DEPLOYMENT__RETRY__MAX_ATTEMPTS`.
//!
//! See [`EngineConfig`](autoflow_engine::EngineConfig) for the execution
//! engine connection settings.

use autoflow_deployment::{DEFAULT_EXECUTION_PAGE, RetryPolicy};
use autoflow_engine::EngineConfig;
use serde::Deserialize;

/// Server configuration composed from library configs.
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// PostgreSQL database connection URL.
    pub database_url: String,

    /// Address the HTTP listener binds to.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Execution engine connection.
    pub engine: EngineConfig,

    /// Runtime sync schedule.
    #[serde(default)]
    pub sync: SyncConfig,

    /// Deployment janitor and retry settings.
    #[serde(default)]
    pub deployment: DeploymentConfig,
}

fn default_bind_address() -> String {
    "0.0.0.0:3000".to_string()
}

/// Periodic runtime sync configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    /// Interval between sync runs, in seconds. Zero disables the task.
    #[serde(default = "default_sync_interval_seconds")]
    pub interval_seconds: u64,

    /// Executions fetched per workflow per run.
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

fn default_sync_interval_seconds() -> u64 {
    300
}

fn default_page_size() -> u32 {
    DEFAULT_EXECUTION_PAGE
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval_seconds: default_sync_interval_seconds(),
            page_size: default_page_size(),
        }
    }
}

/// Deployment-related configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DeploymentConfig {
    /// Age after which a deployment still `deploying` is failed.
    #[serde(default = "default_stuck_after_seconds")]
    pub stuck_after_seconds: u64,

    /// Interval between janitor sweeps, in seconds.
    #[serde(default = "default_janitor_interval_seconds")]
    pub janitor_interval_seconds: u64,

    /// Backoff used when a deploy request asks for retries.
    #[serde(default)]
    pub retry: RetryPolicy,
}

fn default_stuck_after_seconds() -> u64 {
    900
}

fn default_janitor_interval_seconds() -> u64 {
    60
}

impl Default for DeploymentConfig {
    fn default() -> Self {
        Self {
            stuck_after_seconds: default_stuck_after_seconds(),
            janitor_interval_seconds: default_janitor_interval_seconds(),
            retry: RetryPolicy::default(),
        }
    }
}

impl DeploymentConfig {
    /// The janitor's cutoff as a chrono duration.
    #[must_use]
    pub fn stuck_after(&self) -> chrono::Duration {
        chrono::Duration::seconds(i64::try_from(self.stuck_after_seconds).unwrap_or(i64::MAX))
    }
}

impl ServerConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required configuration is missing or invalid.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(
                config::Environment::default()
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}
