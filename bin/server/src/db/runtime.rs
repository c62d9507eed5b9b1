//! Runtime stats and sync log persistence.

use super::{decode_error, store_error};
use async_trait::async_trait;
use autoflow_core::WorkflowId;
use autoflow_deployment::{
    RuntimeStatsStore, StoreError, SyncLogEntry, SyncTarget, WorkflowRuntimeStats,
};
use chrono::{DateTime, Utc};
use rootcause::prelude::Report;
use sqlx::{FromRow, PgPool};
use std::str::FromStr;
use tracing::instrument;

/// Runtime stats columns of the `workflows` table.
#[derive(FromRow)]
pub(super) struct RuntimeStatsRow {
    pub(super) execution_count: i64,
    pub(super) successful_executions: i64,
    pub(super) failed_executions: i64,
    pub(super) last_execution_at: Option<DateTime<Utc>>,
    pub(super) last_execution_status: Option<String>,
    pub(super) last_sync_at: Option<DateTime<Utc>>,
}

fn counter(column: &str, value: i64) -> Result<u64, sqlx::Error> {
    u64::try_from(value).map_err(|e| decode_error(column, &value.to_string(), e))
}

fn counter_column(value: u64) -> Result<i64, StoreError> {
    i64::try_from(value).map_err(|_| StoreError::InvalidData {
        details: format!("counter {value} does not fit its column"),
    })
}

impl RuntimeStatsRow {
    pub(super) fn try_into_stats(self) -> Result<WorkflowRuntimeStats, sqlx::Error> {
        Ok(WorkflowRuntimeStats {
            execution_count: counter("execution count", self.execution_count)?,
            successful_executions: counter("successful executions", self.successful_executions)?,
            failed_executions: counter("failed executions", self.failed_executions)?,
            last_execution_at: self.last_execution_at,
            last_execution_status: self.last_execution_status,
            last_sync_at: self.last_sync_at,
        })
    }
}

/// Row type for sync target queries.
#[derive(FromRow)]
struct SyncTargetRow {
    id: String,
    engine_workflow_id: Option<String>,
    #[sqlx(flatten)]
    stats: RuntimeStatsRow,
}

impl SyncTargetRow {
    fn try_into_target(self) -> Result<SyncTarget, sqlx::Error> {
        let workflow_id =
            WorkflowId::from_str(&self.id).map_err(|e| decode_error("workflow id", &self.id, e))?;
        Ok(SyncTarget {
            workflow_id,
            engine_workflow_id: self.engine_workflow_id,
            stats: self.stats.try_into_stats()?,
        })
    }
}

/// Repository the sync engine writes through.
///
/// Touches only the runtime stats columns of `workflows` and the
/// `sync_logs` table.
#[derive(Clone)]
pub struct RuntimeRepository {
    pool: PgPool,
}

impl RuntimeRepository {
    /// Creates a new repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Row type for sync log queries.
#[derive(FromRow)]
struct SyncLogRow {
    id: String,
    started_at: DateTime<Utc>,
    workflows_processed: i32,
    successful_syncs: i32,
    failed_syncs: i32,
    executions_updated: i64,
    duration_ms: i64,
    errors: serde_json::Value,
}

impl SyncLogRow {
    fn try_into_entry(self) -> Result<SyncLogEntry, sqlx::Error> {
        let id = self
            .id
            .parse()
            .map_err(|e| decode_error("sync log id", &self.id, e))?;
        let count = |column: &str, value: i32| {
            u32::try_from(value).map_err(|e| decode_error(column, &value.to_string(), e))
        };
        let errors: Vec<String> = serde_json::from_value(self.errors).unwrap_or_default();

        Ok(SyncLogEntry {
            id,
            started_at: self.started_at,
            workflows_processed: count("workflows processed", self.workflows_processed)?,
            successful_syncs: count("successful syncs", self.successful_syncs)?,
            failed_syncs: count("failed syncs", self.failed_syncs)?,
            executions_updated: counter("executions updated", self.executions_updated)?,
            duration_ms: self.duration_ms,
            errors,
        })
    }
}

#[async_trait]
impl RuntimeStatsStore for RuntimeRepository {
    async fn sync_target(&self, id: WorkflowId) -> Result<Option<SyncTarget>, Report<StoreError>> {
        let row: Option<SyncTargetRow> = sqlx::query_as(
            r#"
            SELECT id, engine_workflow_id, execution_count, successful_executions,
                   failed_executions, last_execution_at, last_execution_status, last_sync_at
            FROM workflows
            WHERE id = $1
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(row
            .map(SyncTargetRow::try_into_target)
            .transpose()
            .map_err(store_error)?)
    }

    #[instrument(skip(self))]
    async fn deployed_targets(&self) -> Result<Vec<SyncTarget>, Report<StoreError>> {
        let rows: Vec<SyncTargetRow> = sqlx::query_as(
            r#"
            SELECT id, engine_workflow_id, execution_count, successful_executions,
                   failed_executions, last_execution_at, last_execution_status, last_sync_at
            FROM workflows
            WHERE deployment_status = 'deployed' AND engine_workflow_id IS NOT NULL
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(rows
            .into_iter()
            .map(SyncTargetRow::try_into_target)
            .collect::<Result<Vec<_>, _>>()
            .map_err(store_error)?)
    }

    async fn save_stats(
        &self,
        id: WorkflowId,
        stats: &WorkflowRuntimeStats,
    ) -> Result<(), Report<StoreError>> {
        sqlx::query(
            r#"
            UPDATE workflows
            SET execution_count = $2,
                successful_executions = $3,
                failed_executions = $4,
                last_execution_at = $5,
                last_execution_status = $6,
                last_sync_at = $7
            WHERE id = $1
            "#,
        )
        .bind(id.to_string())
        .bind(counter_column(stats.execution_count)?)
        .bind(counter_column(stats.successful_executions)?)
        .bind(counter_column(stats.failed_executions)?)
        .bind(stats.last_execution_at)
        .bind(&stats.last_execution_status)
        .bind(stats.last_sync_at)
        .execute(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(())
    }

    async fn append_sync_log(&self, entry: &SyncLogEntry) -> Result<(), Report<StoreError>> {
        let count = |value: u32| {
            i32::try_from(value).map_err(|_| StoreError::InvalidData {
                details: format!("count {value} does not fit its column"),
            })
        };

        sqlx::query(
            r#"
            INSERT INTO sync_logs (id, started_at, workflows_processed, successful_syncs,
                                   failed_syncs, executions_updated, duration_ms, errors)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(entry.id.to_string())
        .bind(entry.started_at)
        .bind(count(entry.workflows_processed)?)
        .bind(count(entry.successful_syncs)?)
        .bind(count(entry.failed_syncs)?)
        .bind(counter_column(entry.executions_updated)?)
        .bind(entry.duration_ms)
        .bind(serde_json::json!(entry.errors))
        .execute(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(())
    }

    async fn recent_sync_logs(&self, limit: u32) -> Result<Vec<SyncLogEntry>, Report<StoreError>> {
        let rows: Vec<SyncLogRow> = sqlx::query_as(
            r#"
            SELECT id, started_at, workflows_processed, successful_syncs, failed_syncs,
                   executions_updated, duration_ms, errors
            FROM sync_logs
            ORDER BY started_at DESC
            LIMIT $1
            "#,
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(rows
            .into_iter()
            .map(SyncLogRow::try_into_entry)
            .collect::<Result<Vec<_>, _>>()
            .map_err(store_error)?)
    }
}
