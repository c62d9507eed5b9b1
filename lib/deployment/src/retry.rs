//! Caller-level retry for deployments.
//!
//! The orchestrator never retries on its own. `deploy_with_retry` wraps it
//! for callers that want transient engine failures retried: each new attempt
//! deploys a fresh version, since every version gets at most one record.

use crate::error::DeploymentError;
use crate::orchestrator::{DeploymentOutcome, Orchestrator};
use crate::store::{DeploymentStore, WorkflowStore};
use autoflow_core::{UserId, WorkflowId};
use autoflow_engine::ExecutionEngine;
use rootcause::prelude::*;
use serde::Deserialize;
use std::time::Duration;
use tracing::instrument;

/// Exponential backoff settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, the first included.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the second attempt.
    #[serde(default = "default_initial_backoff", with = "millis")]
    pub initial_backoff: Duration,
    /// Factor applied to the delay after each attempt.
    #[serde(default = "default_multiplier")]
    pub multiplier: u32,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff() -> Duration {
    Duration::from_secs(2)
}

fn default_multiplier() -> u32 {
    2
}

mod millis {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff: default_initial_backoff(),
            multiplier: default_multiplier(),
        }
    }
}

impl RetryPolicy {
    /// Delay after the given failed attempt (1-based).
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = self
            .multiplier
            .saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff.saturating_mul(factor)
    }
}

impl<E, W, D> Orchestrator<E, W, D>
where
    E: ExecutionEngine,
    W: WorkflowStore,
    D: DeploymentStore,
{
    /// Deploys, retrying transient engine failures with backoff.
    ///
    /// The workflow's version is bumped before every new attempt. Validation
    /// failures, client errors and orchestrator errors are returned at once.
    /// The outcome of the last attempt is returned.
    #[instrument(skip(self, policy), fields(workflow_id = %workflow_id))]
    pub async fn deploy_with_retry(
        &self,
        workflow_id: WorkflowId,
        activate: bool,
        actor_id: UserId,
        policy: &RetryPolicy,
    ) -> Result<DeploymentOutcome, Report<DeploymentError>> {
        let mut attempt = 1;
        loop {
            let outcome = self.deploy(workflow_id, activate, actor_id).await?;
            if outcome.is_success() || !outcome.is_retryable() || attempt >= policy.max_attempts {
                return Ok(outcome);
            }

            let delay = policy.backoff(attempt);
            tracing::warn!(
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = outcome.error_message().unwrap_or_default(),
                "deployment attempt failed, retrying"
            );
            tokio::time::sleep(delay).await;

            let version = self
                .workflows
                .bump_version(workflow_id)
                .await
                .context(DeploymentError::Persistence)?;
            tracing::debug!(version, "retrying with new version");
            attempt += 1;
        }
    }
}
