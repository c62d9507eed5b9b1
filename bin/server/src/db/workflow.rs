//! Database repository for workflows.
//!
//! Workflow rows are created by the surrounding application. This
//! repository reads them and writes only the deployment columns
//! (`version`, `deployment_status`, `engine_workflow_id`).

use super::runtime::RuntimeStatsRow;
use super::{decode_error, store_error, version_from_column};
use async_trait::async_trait;
use autoflow_core::{UserId, WorkflowId};
use autoflow_deployment::{StoreError, WorkflowRecord, WorkflowStatus, WorkflowStore};
use autoflow_workflow::WorkflowDocument;
use rootcause::prelude::Report;
use sqlx::{FromRow, PgPool};
use std::str::FromStr;
use tracing::instrument;

/// Row type for workflow queries.
#[derive(FromRow)]
struct WorkflowRow {
    id: String,
    owner_id: String,
    name: String,
    document: serde_json::Value,
    version: i32,
    deployment_status: String,
    engine_workflow_id: Option<String>,
    #[sqlx(flatten)]
    stats: RuntimeStatsRow,
}

impl WorkflowRow {
    fn try_into_record(self) -> Result<WorkflowRecord, sqlx::Error> {
        let id =
            WorkflowId::from_str(&self.id).map_err(|e| decode_error("workflow id", &self.id, e))?;
        let owner_id = UserId::from_str(&self.owner_id)
            .map_err(|e| decode_error("owner id", &self.owner_id, e))?;
        let deployment_status = WorkflowStatus::from_str(&self.deployment_status)
            .map_err(|e| decode_error("deployment status", &self.deployment_status, e))?;
        let document: WorkflowDocument = serde_json::from_value(self.document)
            .map_err(|e| decode_error("workflow document", &self.id, e))?;

        Ok(WorkflowRecord {
            id,
            owner_id,
            name: self.name,
            document,
            version: version_from_column(self.version)?,
            deployment_status,
            engine_workflow_id: self.engine_workflow_id,
            runtime_stats: self.stats.try_into_stats()?,
        })
    }
}

/// Repository for workflow operations.
#[derive(Clone)]
pub struct WorkflowRepository {
    pool: PgPool,
}

impl WorkflowRepository {
    /// Creates a new repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WorkflowStore for WorkflowRepository {
    async fn get(&self, id: WorkflowId) -> Result<Option<WorkflowRecord>, Report<StoreError>> {
        let row: Option<WorkflowRow> = sqlx::query_as(
            r#"
            SELECT id, owner_id, name, document, version, deployment_status, engine_workflow_id,
                   execution_count, successful_executions, failed_executions,
                   last_execution_at, last_execution_status, last_sync_at
            FROM workflows
            WHERE id = $1
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(row
            .map(WorkflowRow::try_into_record)
            .transpose()
            .map_err(store_error)?)
    }

    #[instrument(skip(self), fields(workflow_id = %id, status = %status))]
    async fn set_deployment_status(
        &self,
        id: WorkflowId,
        status: WorkflowStatus,
    ) -> Result<(), Report<StoreError>> {
        sqlx::query(
            r#"
            UPDATE workflows
            SET deployment_status = $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id.to_string())
        .bind(status.as_str())
        .execute(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(())
    }

    async fn set_engine_workflow_id(
        &self,
        id: WorkflowId,
        engine_workflow_id: Option<&str>,
    ) -> Result<(), Report<StoreError>> {
        sqlx::query(
            r#"
            UPDATE workflows
            SET engine_workflow_id = $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id.to_string())
        .bind(engine_workflow_id)
        .execute(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(())
    }

    async fn bump_version(&self, id: WorkflowId) -> Result<u32, Report<StoreError>> {
        let version: Option<i32> = sqlx::query_scalar(
            r#"
            UPDATE workflows
            SET version = version + 1, updated_at = NOW()
            WHERE id = $1
            RETURNING version
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)?;

        let version = version.ok_or_else(|| StoreError::InvalidData {
            details: format!("workflow {id} disappeared while bumping its version"),
        })?;
        Ok(version_from_column(version).map_err(store_error)?)
    }
}
