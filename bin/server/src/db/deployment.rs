//! Database repository for deployment records.

use super::{decode_error, store_error, version_column, version_from_column};
use async_trait::async_trait;
use autoflow_core::{DeploymentId, UserId, WorkflowId};
use autoflow_deployment::{DeploymentRecord, DeploymentStatus, DeploymentStore, StoreError};
use chrono::{DateTime, Utc};
use rootcause::prelude::Report;
use sqlx::{FromRow, PgPool};
use std::str::FromStr;
use tracing::instrument;

/// Row type for deployment queries.
#[derive(FromRow)]
struct DeploymentRow {
    id: String,
    workflow_id: String,
    engine_workflow_id: Option<String>,
    version: i32,
    status: String,
    actor_id: String,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    duration_ms: Option<i64>,
    error_message: Option<String>,
    engine_response: Option<serde_json::Value>,
}

impl DeploymentRow {
    fn try_into_record(self) -> Result<DeploymentRecord, sqlx::Error> {
        let id = DeploymentId::from_str(&self.id)
            .map_err(|e| decode_error("deployment id", &self.id, e))?;
        let workflow_id = WorkflowId::from_str(&self.workflow_id)
            .map_err(|e| decode_error("workflow id", &self.workflow_id, e))?;
        let actor_id = UserId::from_str(&self.actor_id)
            .map_err(|e| decode_error("actor id", &self.actor_id, e))?;
        let status = DeploymentStatus::from_str(&self.status)
            .map_err(|e| decode_error("deployment status", &self.status, e))?;

        Ok(DeploymentRecord {
            id,
            workflow_id,
            engine_workflow_id: self.engine_workflow_id,
            version: version_from_column(self.version)?,
            status,
            actor_id,
            started_at: self.started_at,
            completed_at: self.completed_at,
            duration_ms: self.duration_ms,
            error_message: self.error_message,
            engine_response: self.engine_response,
        })
    }
}

/// Repository for deployment records.
///
/// The `(workflow_id, version)` unique constraint is what makes concurrent
/// deploys of one version safe: the loser's insert is a no-op.
#[derive(Clone)]
pub struct DeploymentRepository {
    pool: PgPool,
}

impl DeploymentRepository {
    /// Creates a new repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DeploymentStore for DeploymentRepository {
    #[instrument(skip(self, record), fields(workflow_id = %record.workflow_id, version = record.version))]
    async fn insert(&self, record: &DeploymentRecord) -> Result<bool, Report<StoreError>> {
        let result = sqlx::query(
            r#"
            INSERT INTO deployments (id, workflow_id, engine_workflow_id, version, status,
                                     actor_id, started_at, completed_at, duration_ms,
                                     error_message, engine_response)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (workflow_id, version) DO NOTHING
            "#,
        )
        .bind(record.id.to_string())
        .bind(record.workflow_id.to_string())
        .bind(&record.engine_workflow_id)
        .bind(version_column(record.version)?)
        .bind(record.status.as_str())
        .bind(record.actor_id.to_string())
        .bind(record.started_at)
        .bind(record.completed_at)
        .bind(record.duration_ms)
        .bind(&record.error_message)
        .bind(&record.engine_response)
        .execute(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(result.rows_affected() == 1)
    }

    #[instrument(skip(self, record), fields(deployment_id = %record.id, status = %record.status))]
    async fn update(
        &self,
        record: &DeploymentRecord,
        expected: DeploymentStatus,
    ) -> Result<bool, Report<StoreError>> {
        let result = sqlx::query(
            r#"
            UPDATE deployments
            SET engine_workflow_id = $2,
                status = $3,
                completed_at = $4,
                duration_ms = $5,
                error_message = $6,
                engine_response = $7
            WHERE id = $1 AND status = $8
            "#,
        )
        .bind(record.id.to_string())
        .bind(&record.engine_workflow_id)
        .bind(record.status.as_str())
        .bind(record.completed_at)
        .bind(record.duration_ms)
        .bind(&record.error_message)
        .bind(&record.engine_response)
        .bind(expected.as_str())
        .execute(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(result.rows_affected() == 1)
    }

    async fn find(
        &self,
        workflow_id: WorkflowId,
        version: u32,
    ) -> Result<Option<DeploymentRecord>, Report<StoreError>> {
        let row: Option<DeploymentRow> = sqlx::query_as(
            r#"
            SELECT id, workflow_id, engine_workflow_id, version, status, actor_id,
                   started_at, completed_at, duration_ms, error_message, engine_response
            FROM deployments
            WHERE workflow_id = $1 AND version = $2
            "#,
        )
        .bind(workflow_id.to_string())
        .bind(version_column(version)?)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(row
            .map(DeploymentRow::try_into_record)
            .transpose()
            .map_err(store_error)?)
    }

    async fn list_for_workflow(
        &self,
        workflow_id: WorkflowId,
    ) -> Result<Vec<DeploymentRecord>, Report<StoreError>> {
        let rows: Vec<DeploymentRow> = sqlx::query_as(
            r#"
            SELECT id, workflow_id, engine_workflow_id, version, status, actor_id,
                   started_at, completed_at, duration_ms, error_message, engine_response
            FROM deployments
            WHERE workflow_id = $1
            ORDER BY version DESC
            "#,
        )
        .bind(workflow_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(rows
            .into_iter()
            .map(DeploymentRow::try_into_record)
            .collect::<Result<Vec<_>, _>>()
            .map_err(store_error)?)
    }

    async fn list_stuck(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<DeploymentRecord>, Report<StoreError>> {
        let rows: Vec<DeploymentRow> = sqlx::query_as(
            r#"
            SELECT id, workflow_id, engine_workflow_id, version, status, actor_id,
                   started_at, completed_at, duration_ms, error_message, engine_response
            FROM deployments
            WHERE status = 'deploying' AND started_at < $1
            ORDER BY started_at ASC
            "#,
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(rows
            .into_iter()
            .map(DeploymentRow::try_into_record)
            .collect::<Result<Vec<_>, _>>()
            .map_err(store_error)?)
    }

    async fn record_first_deployment(
        &self,
        user_id: UserId,
        workflow_id: WorkflowId,
        at: DateTime<Utc>,
    ) -> Result<bool, Report<StoreError>> {
        let result = sqlx::query(
            r#"
            INSERT INTO user_deployment_milestones (user_id, first_workflow_id, first_deployed_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id) DO NOTHING
            "#,
        )
        .bind(user_id.to_string())
        .bind(workflow_id.to_string())
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(result.rows_affected() == 1)
    }
}
