//! Runtime reconciliation.
//!
//! Pulls execution history from the engine and folds it into each
//! workflow's runtime stats. Runs are idempotent: the stats watermark keeps
//! an execution from being counted twice. Every run appends exactly one row
//! to the sync log, whether it covered one workflow or all of them.

use crate::error::SyncError;
use crate::stats::{SyncLogEntry, WorkflowRuntimeStats};
use crate::store::{RuntimeStatsStore, SyncTarget};
use autoflow_core::WorkflowId;
use autoflow_engine::ExecutionEngine;
use chrono::Utc;
use rootcause::prelude::*;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::instrument;

/// Executions fetched per workflow per run.
pub const DEFAULT_EXECUTION_PAGE: u32 = 100;

/// Result of reconciling one workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncOutcome {
    pub workflow_id: WorkflowId,
    pub executions_updated: u64,
    pub stats: WorkflowRuntimeStats,
}

/// Reconciles runtime stats with the engine.
pub struct SyncEngine<E, S> {
    engine: E,
    store: S,
    page_size: u32,
    /// Serializes runs so two runs never read the same watermark.
    run_lock: Mutex<()>,
}

impl<E, S> SyncEngine<E, S>
where
    E: ExecutionEngine,
    S: RuntimeStatsStore,
{
    pub fn new(engine: E, store: S) -> Self {
        Self {
            engine,
            store,
            page_size: DEFAULT_EXECUTION_PAGE,
            run_lock: Mutex::new(()),
        }
    }

    /// Sets how many executions are fetched per workflow.
    #[must_use]
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    /// Reconciles one workflow and logs the run.
    ///
    /// A failed reconciliation is still logged before the error is returned.
    #[instrument(skip(self), fields(workflow_id = %workflow_id))]
    pub async fn reconcile(
        &self,
        workflow_id: WorkflowId,
    ) -> Result<SyncOutcome, Report<SyncError>> {
        let _guard = self.run_lock.lock().await;
        let mut entry = SyncLogEntry::start(Utc::now());

        let result = match self.target(workflow_id).await {
            Ok(target) => self.sync_target(target).await,
            Err(e) => Err(e),
        };
        match &result {
            Ok(outcome) => entry.record_success(outcome.executions_updated),
            Err(e) => entry.record_failure(format!("{workflow_id}: {}", e.current_context())),
        }

        self.finish(&mut entry).await?;
        result
    }

    /// Reconciles every deployed workflow and logs the batch as one run.
    ///
    /// A failing workflow is recorded in the log's errors and does not stop
    /// the others.
    #[instrument(skip(self))]
    pub async fn reconcile_all(&self) -> Result<SyncLogEntry, Report<SyncError>> {
        let _guard = self.run_lock.lock().await;
        let mut entry = SyncLogEntry::start(Utc::now());

        let targets = match self.store.deployed_targets().await {
            Ok(targets) => targets,
            Err(report) => {
                entry.errors.push(format!("listing workflows: {}", report.current_context()));
                self.finish(&mut entry).await?;
                return Err(report.context(SyncError::Persistence));
            }
        };

        for target in targets {
            let workflow_id = target.workflow_id;
            match self.sync_target(target).await {
                Ok(outcome) => entry.record_success(outcome.executions_updated),
                Err(e) => {
                    tracing::warn!(
                        workflow_id = %workflow_id,
                        error = %e.current_context(),
                        "workflow sync failed"
                    );
                    entry.record_failure(format!("{workflow_id}: {}", e.current_context()));
                }
            }
        }

        self.finish(&mut entry).await?;
        tracing::info!(
            workflows = entry.workflows_processed,
            failed = entry.failed_syncs,
            executions = entry.executions_updated,
            "sync run complete"
        );
        Ok(entry)
    }

    /// Lists the most recent sync runs, newest first.
    pub async fn history(&self, limit: u32) -> Result<Vec<SyncLogEntry>, Report<SyncError>> {
        let entries = self
            .store
            .recent_sync_logs(limit)
            .await
            .context(SyncError::Persistence)?;
        Ok(entries)
    }

    async fn target(&self, workflow_id: WorkflowId) -> Result<SyncTarget, Report<SyncError>> {
        self.store
            .sync_target(workflow_id)
            .await
            .context(SyncError::Persistence)?
            .ok_or_else(|| SyncError::WorkflowNotFound { id: workflow_id }.into())
    }

    async fn sync_target(&self, target: SyncTarget) -> Result<SyncOutcome, Report<SyncError>> {
        let workflow_id = target.workflow_id;
        let engine_workflow_id = target
            .engine_workflow_id
            .as_deref()
            .ok_or(SyncError::NotDeployed { id: workflow_id })?;

        let executions = self
            .engine
            .executions(Some(engine_workflow_id), self.page_size)
            .await
            .map_err(SyncError::Engine)?;

        let mut stats = target.stats;
        let executions_updated = stats.apply(&executions, Utc::now());
        self.store
            .save_stats(workflow_id, &stats)
            .await
            .context(SyncError::Persistence)?;

        tracing::debug!(
            workflow_id = %workflow_id,
            executions_updated,
            "workflow stats reconciled"
        );
        Ok(SyncOutcome {
            workflow_id,
            executions_updated,
            stats,
        })
    }

    /// Stamps the duration and appends the entry to the log.
    async fn finish(&self, entry: &mut SyncLogEntry) -> Result<(), Report<SyncError>> {
        entry.finish(Utc::now());
        self.store
            .append_sync_log(entry)
            .await
            .context(SyncError::Persistence)?;
        Ok(())
    }
}
