//! In-memory fakes for orchestrator and sync tests.

use crate::error::StoreError;
use crate::record::{DeploymentRecord, DeploymentStatus, WorkflowRecord, WorkflowStatus};
use crate::stats::{SyncLogEntry, WorkflowRuntimeStats};
use crate::store::{DeploymentStore, RuntimeStatsStore, SyncTarget, WorkflowStore};
use async_trait::async_trait;
use autoflow_core::{UserId, WorkflowId};
use autoflow_engine::{
    ConnectionStatus, DeployedWorkflow, EngineError, EngineExecution, ExecutionEngine,
    ExecutionStatus, HealthStatus,
};
use autoflow_workflow::{Node, ValidationResult, WorkflowDocument};
use chrono::{DateTime, TimeZone, Utc};
use rootcause::prelude::Report;
use serde_json::{Value as JsonValue, json};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

pub(crate) fn deployable_document() -> WorkflowDocument {
    WorkflowDocument::new("Nightly report")
        .with_node(Node::new("1", "Manual", "manualTrigger"))
        .with_node(Node::new("2", "Done", "noOp"))
        .connect("1", "2")
}

/// A finished execution stopped at 10:`minute` on a fixed day.
pub(crate) fn execution(id: &str, minute: u32, status: ExecutionStatus) -> EngineExecution {
    let at: DateTime<Utc> = Utc
        .with_ymd_and_hms(2026, 3, 1, 10, minute, 0)
        .single()
        .unwrap();
    EngineExecution {
        id: id.to_string(),
        workflow_id: None,
        finished: status == ExecutionStatus::Success,
        mode: Some("trigger".to_string()),
        started_at: Some(at),
        stopped_at: Some(at),
        status: Some(status),
    }
}

#[derive(Default)]
struct StoreState {
    workflows: HashMap<WorkflowId, WorkflowRecord>,
    deployments: Vec<DeploymentRecord>,
    sync_logs: Vec<SyncLogEntry>,
    milestones: HashMap<UserId, WorkflowId>,
}

/// Shared in-memory implementation of every store trait.
#[derive(Clone, Default)]
pub(crate) struct InMemoryStore {
    state: Arc<Mutex<StoreState>>,
}

impl InMemoryStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add_workflow(&self, document: WorkflowDocument) -> WorkflowId {
        let record = WorkflowRecord::draft(UserId::new(), document);
        let id = record.id;
        self.state.lock().unwrap().workflows.insert(id, record);
        id
    }

    pub(crate) fn mark_deployed(&self, id: WorkflowId, engine_workflow_id: &str) {
        let mut state = self.state.lock().unwrap();
        let workflow = state.workflows.get_mut(&id).unwrap();
        workflow.deployment_status = WorkflowStatus::Deployed;
        workflow.engine_workflow_id = Some(engine_workflow_id.to_string());
    }

    pub(crate) fn insert_deployment(&self, record: DeploymentRecord) {
        self.state.lock().unwrap().deployments.push(record);
    }

    /// Fails every record still deploying, the way the janitor would.
    pub(crate) fn fail_in_flight(&self, message: &str) {
        let mut state = self.state.lock().unwrap();
        for record in &mut state.deployments {
            if record.status == DeploymentStatus::Deploying {
                record.status = DeploymentStatus::Failed;
                record.error_message = Some(message.to_string());
            }
        }
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

    fn with_workflow<T>(
        &self,
        id: WorkflowId,
        f: impl FnOnce(&mut WorkflowRecord) -> T,
    ) -> Result<T, Report<StoreError>> {
        let mut state = self.state.lock().unwrap();
        let workflow = state.workflows.get_mut(&id).ok_or(StoreError::Database {
            details: format!("no workflow {id}"),
        })?;
        Ok(f(workflow))
    }
}

#[async_trait]
impl WorkflowStore for InMemoryStore {
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
        self.with_workflow(id, |w| {
            w.engine_workflow_id = engine_workflow_id.map(str::to_string);
        })
    }

    async fn bump_version(&self, id: WorkflowId) -> Result<u32, Report<StoreError>> {
        self.with_workflow(id, |w| {
            w.version += 1;
            w.version
        })
    }
}

#[async_trait]
impl DeploymentStore for InMemoryStore {
    async fn insert(&self, record: &DeploymentRecord) -> Result<bool, Report<StoreError>> {
        let mut state = self.state.lock().unwrap();
        let exists = state
            .deployments
            .iter()
            .any(|r| r.workflow_id == record.workflow_id && r.version == record.version);
        if exists {
            return Ok(false);
        }
        state.deployments.push(record.clone());
        Ok(true)
    }

    async fn update(
        &self,
        record: &DeploymentRecord,
        expected: DeploymentStatus,
    ) -> Result<bool, Report<StoreError>> {
        let mut state = self.state.lock().unwrap();
        let stored = state
            .deployments
            .iter_mut()
            .find(|r| r.id == record.id)
            .ok_or(StoreError::Database {
                details: format!("no deployment {}", record.id),
            })?;
        if stored.status != expected {
            return Ok(false);
        }
        *stored = record.clone();
        Ok(true)
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
            .find(|r| r.workflow_id == workflow_id && r.version == version)
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
            .filter(|r| r.workflow_id == workflow_id)
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
            .filter(|r| r.status == DeploymentStatus::Deploying && r.started_at < cutoff)
            .cloned()
            .collect())
    }

    async fn record_first_deployment(
        &self,
        user_id: UserId,
        workflow_id: WorkflowId,
        _at: DateTime<Utc>,
    ) -> Result<bool, Report<StoreError>> {
        let mut state = self.state.lock().unwrap();
        if state.milestones.contains_key(&user_id) {
            return Ok(false);
        }
        state.milestones.insert(user_id, workflow_id);
        Ok(true)
    }
}

#[async_trait]
impl RuntimeStatsStore for InMemoryStore {
    async fn sync_target(&self, id: WorkflowId) -> Result<Option<SyncTarget>, Report<StoreError>> {
        Ok(self.state.lock().unwrap().workflows.get(&id).map(|w| SyncTarget {
            workflow_id: w.id,
            engine_workflow_id: w.engine_workflow_id.clone(),
            stats: w.runtime_stats.clone(),
        }))
    }

    async fn deployed_targets(&self) -> Result<Vec<SyncTarget>, Report<StoreError>> {
        let state = self.state.lock().unwrap();
        let mut targets: Vec<_> = state
            .workflows
            .values()
            .filter(|w| w.deployment_status == WorkflowStatus::Deployed)
            .map(|w| SyncTarget {
                workflow_id: w.id,
                engine_workflow_id: w.engine_workflow_id.clone(),
                stats: w.runtime_stats.clone(),
            })
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
        let state = self.state.lock().unwrap();
        Ok(state
            .sync_logs
            .iter()
            .rev()
            .take(limit as usize)
            .cloned()
            .collect())
    }
}

type DeployHook = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct EngineState {
    deploy_results: VecDeque<Result<DeployedWorkflow, EngineError>>,
    before_deploy: Option<DeployHook>,
    deploy_calls: usize,
    next_failure: Option<EngineError>,
    executions: HashMap<String, Result<Vec<EngineExecution>, EngineError>>,
    calls: Vec<String>,
}

/// Scripted engine. Deploys succeed with ids `eng-1`, `eng-2`, ... unless a
/// result was queued.
#[derive(Clone, Default)]
pub(crate) struct FakeEngine {
    state: Arc<Mutex<EngineState>>,
}

impl FakeEngine {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push_deploy_result(&self, result: Result<DeployedWorkflow, EngineError>) {
        self.state.lock().unwrap().deploy_results.push_back(result);
    }

    /// Runs `hook` at the start of every deploy call.
    pub(crate) fn before_deploy(&self, hook: impl Fn() + Send + Sync + 'static) {
        self.state.lock().unwrap().before_deploy = Some(Arc::new(hook));
    }

    /// Makes the next non-deploy call fail.
    pub(crate) fn fail_next_call(&self, error: EngineError) {
        self.state.lock().unwrap().next_failure = Some(error);
    }

    pub(crate) fn set_executions(
        &self,
        engine_workflow_id: &str,
        executions: Vec<EngineExecution>,
    ) {
        self.state
            .lock()
            .unwrap()
            .executions
            .insert(engine_workflow_id.to_string(), Ok(executions));
    }

    pub(crate) fn fail_executions_for(&self, engine_workflow_id: &str, error: EngineError) {
        self.state
            .lock()
            .unwrap()
            .executions
            .insert(engine_workflow_id.to_string(), Err(error));
    }

    pub(crate) fn deploy_calls(&self) -> usize {
        self.state.lock().unwrap().deploy_calls
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    fn call(&self, name: String) -> Result<JsonValue, EngineError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(name);
        match state.next_failure.take() {
            Some(error) => Err(error),
            None => Ok(json!({ "success": true })),
        }
    }
}

#[async_trait]
impl ExecutionEngine for FakeEngine {
    async fn test_connection(&self) -> Result<ConnectionStatus, EngineError> {
        self.call("test_connection".to_string())?;
        Ok(ConnectionStatus { workflow_count: 0 })
    }

    async fn node_types(&self) -> Result<JsonValue, EngineError> {
        self.call("node_types".to_string())
    }

    async fn deploy(
        &self,
        _doc: &WorkflowDocument,
        activate: bool,
    ) -> Result<DeployedWorkflow, EngineError> {
        let hook = self.state.lock().unwrap().before_deploy.clone();
        if let Some(hook) = hook {
            hook();
        }

        let mut state = self.state.lock().unwrap();
        state.deploy_calls += 1;
        state.calls.push("deploy".to_string());
        let n = state.deploy_calls;
        state.deploy_results.pop_front().unwrap_or_else(|| {
            Ok(DeployedWorkflow {
                engine_workflow_id: format!("eng-{n}"),
                active: activate,
                activation_error: None,
                response: json!({ "id": format!("eng-{n}"), "active": activate }),
                validation: ValidationResult {
                    valid: true,
                    ..Default::default()
                },
            })
        })
    }

    async fn executions(
        &self,
        workflow_id: Option<&str>,
        limit: u32,
    ) -> Result<Vec<EngineExecution>, EngineError> {
        let id = workflow_id.unwrap_or_default();
        self.call(format!("executions:{id}"))?;
        let state = self.state.lock().unwrap();
        match state.executions.get(id) {
            Some(Ok(executions)) => Ok(executions.iter().take(limit as usize).cloned().collect()),
            Some(Err(error)) => Err(error.clone()),
            None => Ok(Vec::new()),
        }
    }

    async fn activate(&self, engine_workflow_id: &str) -> Result<JsonValue, EngineError> {
        self.call(format!("activate:{engine_workflow_id}"))
    }

    async fn deactivate(&self, engine_workflow_id: &str) -> Result<JsonValue, EngineError> {
        self.call(format!("deactivate:{engine_workflow_id}"))
    }

    async fn delete(&self, engine_workflow_id: &str) -> Result<JsonValue, EngineError> {
        self.call(format!("delete:{engine_workflow_id}"))
    }

    async fn health(&self) -> HealthStatus {
        HealthStatus::healthy()
    }
}
