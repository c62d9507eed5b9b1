//! In-memory stores and fixtures for router tests.

use async_trait::async_trait;
use autoflow_core::{UserId, WorkflowId};
use autoflow_deployment::{
    DeploymentRecord, DeploymentStatus, DeploymentStore, RuntimeStatsStore, StoreError,
    SyncLogEntry, SyncTarget, WorkflowRecord, WorkflowRuntimeStats, WorkflowStatus, WorkflowStore,
};
use autoflow_workflow::{Node, WorkflowDocument};
use chrono::{DateTime, Utc};
use rootcause::prelude::Report;
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

pub(crate) fn deployable_document() -> WorkflowDocument {
    WorkflowDocument::new("Inbound orders")
        .with_node(Node::new("1", "Webhook", "webhook").with_param("path", json!("orders")))
        .with_node(
            Node::new("2", "Forward", "httpRequest")
                .with_param("url", json!("https://example.com/orders")),
        )
        .connect("1", "2")
}

#[derive(Default)]
struct State {
    workflows: HashMap<WorkflowId, WorkflowRecord>,
    deployments: Vec<DeploymentRecord>,
    milestones: HashSet<UserId>,
    sync_logs: Vec<SyncLogEntry>,
}

/// One store behind all three storage traits.
#[derive(Clone, Default)]
pub(crate) struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add_workflow(&self, document: WorkflowDocument) -> WorkflowId {
        let record = WorkflowRecord::draft(UserId::new(), document);
        let id = record.id;
        self.state.lock().unwrap().workflows.insert(id, record);
        id
    }

    pub(crate) fn workflow(&self, id: WorkflowId) -> WorkflowRecord {
        self.state.lock().unwrap().workflows[&id].clone()
    }

    pub(crate) fn deployments(&self) -> Vec<DeploymentRecord> {
        self.state.lock().unwrap().deployments.clone()
    }

    pub(crate) fn sync_logs(&self) -> Vec<SyncLogEntry> {
        self.state.lock().unwrap().sync_logs.clone()
    }

    fn with_workflow(
        &self,
        id: WorkflowId,
        update: impl FnOnce(&mut WorkflowRecord),
    ) -> Result<(), Report<StoreError>> {
        let mut state = self.state.lock().unwrap();
        let workflow = state
            .workflows
            .get_mut(&id)
            .ok_or_else(|| StoreError::InvalidData {
                details: format!("no workflow {id}"),
            })?;
        update(workflow);
        Ok(())
    }
}

fn target(workflow: &WorkflowRecord) -> SyncTarget {
    SyncTarget {
        workflow_id: workflow.id,
        engine_workflow_id: workflow.engine_workflow_id.clone(),
        stats: workflow.runtime_stats.clone(),
    }
}

#[async_trait]
impl WorkflowStore for MemoryStore {
    async fn get(&self, id: WorkflowId) -> Result<Option<WorkflowRecord>, Report<StoreError>> {
        Ok(self.state.lock().unwrap().workflows.get(&id).cloned())
    }

    async fn set_deployment_status(
        &self,
        id: WorkflowId,
        status: WorkflowStatus,
    ) -> Result<(), Report<StoreError>> {
        self.with_workflow(id, |w| w.deployment_status = status)
    }

    async fn set_engine_workflow_id(
        &self,
        id: WorkflowId,
        engine_workflow_id: Option<&str>,
    ) -> Result<(), Report<StoreError>> {
        let engine_workflow_id = engine_workflow_id.map(str::to_string);
        self.with_workflow(id, |w| w.engine_workflow_id = engine_workflow_id)
    }

    async fn bump_version(&self, id: WorkflowId) -> Result<u32, Report<StoreError>> {
        let mut version = 0;
        self.with_workflow(id, |w| {
            w.version += 1;
            version = w.version;
        })?;
        Ok(version)
    }
}

#[async_trait]
impl DeploymentStore for MemoryStore {
    async fn insert(&self, record: &DeploymentRecord) -> Result<bool, Report<StoreError>> {
        let mut state = self.state.lock().unwrap();
        let taken = state
            .deployments
            .iter()
            .any(|d| d.workflow_id == record.workflow_id && d.version == record.version);
        if !taken {
            state.deployments.push(record.clone());
        }
        Ok(!taken)
    }

    async fn update(
        &self,
        record: &DeploymentRecord,
        expected: DeploymentStatus,
    ) -> Result<bool, Report<StoreError>> {
        let mut state = self.state.lock().unwrap();
        match state
            .deployments
            .iter_mut()
            .find(|d| d.id == record.id && d.status == expected)
        {
            Some(existing) => {
                *existing = record.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn find(
        &self,
        workflow_id: WorkflowId,
        version: u32,
    ) -> Result<Option<DeploymentRecord>, Report<StoreError>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .deployments
            .iter()
            .find(|d| d.workflow_id == workflow_id && d.version == version)
            .cloned())
    }

    async fn list_for_workflow(
        &self,
        workflow_id: WorkflowId,
    ) -> Result<Vec<DeploymentRecord>, Report<StoreError>> {
        let mut records: Vec<_> = self
            .state
            .lock()
            .unwrap()
            .deployments
            .iter()
            .filter(|d| d.workflow_id == workflow_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.version.cmp(&a.version));
        Ok(records)
    }

    async fn list_stuck(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<DeploymentRecord>, Report<StoreError>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .deployments
            .iter()
            .filter(|d| d.status == DeploymentStatus::Deploying && d.started_at < cutoff)
            .cloned()
            .collect())
    }

    async fn record_first_deployment(
        &self,
        user_id: UserId,
        _workflow_id: WorkflowId,
        _at: DateTime<Utc>,
    ) -> Result<bool, Report<StoreError>> {
        Ok(self.state.lock().unwrap().milestones.insert(user_id))
    }
}

#[async_trait]
impl RuntimeStatsStore for MemoryStore {
    async fn sync_target(&self, id: WorkflowId) -> Result<Option<SyncTarget>, Report<StoreError>> {
        Ok(self.state.lock().unwrap().workflows.get(&id).map(target))
    }

    async fn deployed_targets(&self) -> Result<Vec<SyncTarget>, Report<StoreError>> {
        let state = self.state.lock().unwrap();
        let mut targets: Vec<_> = state
            .workflows
            .values()
            .filter(|w| w.deployment_status == WorkflowStatus::Deployed)
            .map(target)
            .collect();
        targets.sort_by_key(|t| t.workflow_id);
        Ok(targets)
    }

    async fn save_stats(
        &self,
        id: WorkflowId,
        stats: &WorkflowRuntimeStats,
    ) -> Result<(), Report<StoreError>> {
        self.with_workflow(id, |w| w.runtime_stats = stats.clone())
    }

    async fn append_sync_log(&self, entry: &SyncLogEntry) -> Result<(), Report<StoreError>> {
        self.state.lock().unwrap().sync_logs.push(entry.clone());
        Ok(())
    }

    async fn recent_sync_logs(&self, limit: u32) -> Result<Vec<SyncLogEntry>, Report<StoreError>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .sync_logs
            .iter()
            .rev()
            .take(limit as usize)
            .cloned()
            .collect())
    }
}
