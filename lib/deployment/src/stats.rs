//! Runtime statistics and the sync log.

use autoflow_core::SyncLogId;
use autoflow_engine::EngineExecution;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Execution counters mirrored from the engine.
///
/// Counters never decrease. `last_execution_at` is the watermark: only
/// executions that stopped after it are counted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowRuntimeStats {
    pub execution_count: u64,
    pub successful_executions: u64,
    pub failed_executions: u64,
    pub last_execution_at: Option<DateTime<Utc>>,
    pub last_execution_status: Option<String>,
    pub last_sync_at: Option<DateTime<Utc>>,
}

impl WorkflowRuntimeStats {
    /// Folds a page of executions into the counters.
    ///
    /// Unfinished executions and executions at or before the watermark are
    /// ignored. Returns the number of executions counted. `last_sync_at` is
    /// set to `now` either way.
    pub fn apply(&mut self, executions: &[EngineExecution], now: DateTime<Utc>) -> u64 {
        let mut fresh: Vec<(&EngineExecution, DateTime<Utc>)> = executions
            .iter()
            .filter(|e| e.is_finished())
            .filter_map(|e| e.stopped_at.map(|at| (e, at)))
            .filter(|(_, at)| self.last_execution_at.is_none_or(|mark| *at > mark))
            .collect();
        fresh.sort_by_key(|(_, at)| *at);

        for (execution, _) in &fresh {
            self.execution_count += 1;
            if execution.succeeded() {
                self.successful_executions += 1;
            } else {
                self.failed_executions += 1;
            }
        }

        if let Some((newest, at)) = fresh.last() {
            self.last_execution_at = Some(*at);
            self.last_execution_status = Some(newest.outcome().as_str().to_string());
        }
        self.last_sync_at = Some(now);

        fresh.len() as u64
    }
}

/// One row of the append-only sync log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncLogEntry {
    pub id: SyncLogId,
    pub started_at: DateTime<Utc>,
    pub workflows_processed: u32,
    pub successful_syncs: u32,
    pub failed_syncs: u32,
    pub executions_updated: u64,
    pub duration_ms: i64,
    pub errors: Vec<String>,
}

impl SyncLogEntry {
    /// Starts an empty entry.
    #[must_use]
    pub fn start(started_at: DateTime<Utc>) -> Self {
        Self {
            id: SyncLogId::new(),
            started_at,
            workflows_processed: 0,
            successful_syncs: 0,
            failed_syncs: 0,
            executions_updated: 0,
            duration_ms: 0,
            errors: Vec::new(),
        }
    }

    pub fn record_success(&mut self, executions_updated: u64) {
        self.workflows_processed += 1;
        self.successful_syncs += 1;
        self.executions_updated += executions_updated;
    }

    pub fn record_failure(&mut self, error: impl Into<String>) {
        self.workflows_processed += 1;
        self.failed_syncs += 1;
        self.errors.push(error.into());
    }

    /// Stamps the duration.
    pub fn finish(&mut self, at: DateTime<Utc>) {
        self.duration_ms = (at - self.started_at).num_milliseconds().max(0);
    }
}
