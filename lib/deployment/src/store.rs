//! Storage traits.
//!
//! The orchestrator and the sync engine write disjoint data. Each gets its
//! own traits so neither can touch the other's columns:
//! - `WorkflowStore` and `DeploymentStore` serve the orchestrator
//! - `RuntimeStatsStore` serves the sync engine

use crate::error::StoreError;
use crate::record::{DeploymentRecord, DeploymentStatus, WorkflowRecord, WorkflowStatus};
use crate::stats::{SyncLogEntry, WorkflowRuntimeStats};
use async_trait::async_trait;
use autoflow_core::{UserId, WorkflowId};
use chrono::{DateTime, Utc};
use rootcause::prelude::Report;
use std::sync::Arc;

/// Workflow access for the orchestrator.
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    /// Loads a workflow.
    async fn get(&self, id: WorkflowId) -> Result<Option<WorkflowRecord>, Report<StoreError>>;

    /// Sets the workflow's deployment status.
    async fn set_deployment_status(
        &self,
        id: WorkflowId,
        status: WorkflowStatus,
    ) -> Result<(), Report<StoreError>>;

    /// Sets or clears the workflow's engine id.
    async fn set_engine_workflow_id(
        &self,
        id: WorkflowId,
        engine_workflow_id: Option<&str>,
    ) -> Result<(), Report<StoreError>>;

    /// Increments the workflow's version and returns the new value.
    async fn bump_version(&self, id: WorkflowId) -> Result<u32, Report<StoreError>>;
}

/// Deployment record persistence.
#[async_trait]
pub trait DeploymentStore: Send + Sync {
    /// Inserts a pending record.
    ///
    /// Returns false without writing when a record for the same
    /// `(workflow_id, version)` already exists.
    async fn insert(&self, record: &DeploymentRecord) -> Result<bool, Report<StoreError>>;

    /// Overwrites a record's mutable fields if the stored row is still in
    /// `expected` status.
    ///
    /// Returns false without writing when the stored status differs, so a
    /// row that reached a terminal status is never overwritten by a writer
    /// holding an older copy.
    async fn update(
        &self,
        record: &DeploymentRecord,
        expected: DeploymentStatus,
    ) -> Result<bool, Report<StoreError>>;

    async fn find(
        &self,
        workflow_id: WorkflowId,
        version: u32,
    ) -> Result<Option<DeploymentRecord>, Report<StoreError>>;

    /// Lists a workflow's deployments, newest version first.
    async fn list_for_workflow(
        &self,
        workflow_id: WorkflowId,
    ) -> Result<Vec<DeploymentRecord>, Report<StoreError>>;

    /// Lists records still `deploying` that started before `cutoff`.
    async fn list_stuck(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<DeploymentRecord>, Report<StoreError>>;

    /// Records a user's first successful deployment.
    ///
    /// Returns true if this was the first one.
    async fn record_first_deployment(
        &self,
        user_id: UserId,
        workflow_id: WorkflowId,
        at: DateTime<Utc>,
    ) -> Result<bool, Report<StoreError>>;
}

/// What the sync engine needs to reconcile one workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncTarget {
    pub workflow_id: WorkflowId,
    pub engine_workflow_id: Option<String>,
    pub stats: WorkflowRuntimeStats,
}

/// Runtime stats and sync log persistence for the sync engine.
#[async_trait]
pub trait RuntimeStatsStore: Send + Sync {
    async fn sync_target(&self, id: WorkflowId) -> Result<Option<SyncTarget>, Report<StoreError>>;

    /// Lists every workflow currently deployed on the engine.
    async fn deployed_targets(&self) -> Result<Vec<SyncTarget>, Report<StoreError>>;

    async fn save_stats(
        &self,
        id: WorkflowId,
        stats: &WorkflowRuntimeStats,
    ) -> Result<(), Report<StoreError>>;

    async fn append_sync_log(&self, entry: &SyncLogEntry) -> Result<(), Report<StoreError>>;

    /// Lists the most recent sync runs, newest first.
    async fn recent_sync_logs(&self, limit: u32) -> Result<Vec<SyncLogEntry>, Report<StoreError>>;
}

#[async_trait]
impl<T: WorkflowStore + ?Sized> WorkflowStore for Arc<T> {
    async fn get(&self, id: WorkflowId) -> Result<Option<WorkflowRecord>, Report<StoreError>> {
        (**self).get(id).await
    }

    async fn set_deployment_status(
        &self,
        id: WorkflowId,
        status: WorkflowStatus,
    ) -> Result<(), Report<StoreError>> {
        (**self).set_deployment_status(id, status).await
    }

    async fn set_engine_workflow_id(
        &self,
        id: WorkflowId,
        engine_workflow_id: Option<&str>,
    ) -> Result<(), Report<StoreError>> {
        (**self).set_engine_workflow_id(id, engine_workflow_id).await
    }

    async fn bump_version(&self, id: WorkflowId) -> Result<u32, Report<StoreError>> {
        (**self).bump_version(id).await
    }
}

#[async_trait]
impl<T: DeploymentStore + ?Sized> DeploymentStore for Arc<T> {
    async fn insert(&self, record: &DeploymentRecord) -> Result<bool, Report<StoreError>> {
        (**self).insert(record).await
    }

    async fn update(
        &self,
        record: &DeploymentRecord,
        expected: DeploymentStatus,
    ) -> Result<bool, Report<StoreError>> {
        (**self).update(record, expected).await
    }

    async fn find(
        &self,
        workflow_id: WorkflowId,
        version: u32,
    ) -> Result<Option<DeploymentRecord>, Report<StoreError>> {
        (**self).find(workflow_id, version).await
    }

    async fn list_for_workflow(
        &self,
        workflow_id: WorkflowId,
    ) -> Result<Vec<DeploymentRecord>, Report<StoreError>> {
        (**self).list_for_workflow(workflow_id).await
    }

    async fn list_stuck(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<DeploymentRecord>, Report<StoreError>> {
        (**self).list_stuck(cutoff).await
    }

    async fn record_first_deployment(
        &self,
        user_id: UserId,
        workflow_id: WorkflowId,
        at: DateTime<Utc>,
    ) -> Result<bool, Report<StoreError>> {
        (**self).record_first_deployment(user_id, workflow_id, at).await
    }
}

#[async_trait]
impl<T: RuntimeStatsStore + ?Sized> RuntimeStatsStore for Arc<T> {
    async fn sync_target(&self, id: WorkflowId) -> Result<Option<SyncTarget>, Report<StoreError>> {
        (**self).sync_target(id).await
    }

    async fn deployed_targets(&self) -> Result<Vec<SyncTarget>, Report<StoreError>> {
        (**self).deployed_targets().await
    }

    async fn save_stats(
        &self,
        id: WorkflowId,
        stats: &WorkflowRuntimeStats,
    ) -> Result<(), Report<StoreError>> {
        (**self).save_stats(id, stats).await
    }

    async fn append_sync_log(&self, entry: &SyncLogEntry) -> Result<(), Report<StoreError>> {
        (**self).append_sync_log(entry).await
    }

    async fn recent_sync_logs(&self, limit: u32) -> Result<Vec<SyncLogEntry>, Report<StoreError>> {
        (**self).recent_sync_logs(limit).await
    }
}
