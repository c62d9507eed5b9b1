//! Shared application state.

use autoflow_deployment::{
    DeploymentStore, Orchestrator, RetryPolicy, RuntimeStatsStore, SyncEngine, WorkflowStore,
};
use autoflow_engine::ExecutionEngine;
use autoflow_workflow::WorkflowValidator;
use std::sync::Arc;

/// The execution engine as shared by handlers and background tasks.
pub type SharedEngine = Arc<dyn ExecutionEngine>;

/// Orchestrator over type-erased stores.
pub type DeploymentOrchestrator =
    Orchestrator<SharedEngine, Arc<dyn WorkflowStore>, Arc<dyn DeploymentStore>>;

/// Sync engine over a type-erased store.
pub type RuntimeSync = SyncEngine<SharedEngine, Arc<dyn RuntimeStatsStore>>;

/// Application state shared across handlers.
pub struct AppState {
    /// Validator used by the standalone validation endpoint.
    pub validator: WorkflowValidator,
    /// Execution engine client.
    pub engine: SharedEngine,
    /// Deployment orchestrator.
    pub orchestrator: DeploymentOrchestrator,
    /// Runtime sync engine.
    pub sync: RuntimeSync,
    /// Backoff for deploy requests that ask for retries.
    pub retry: RetryPolicy,
}

impl AppState {
    /// Creates new application state.
    pub fn new(
        validator: WorkflowValidator,
        engine: SharedEngine,
        workflows: Arc<dyn WorkflowStore>,
        deployments: Arc<dyn DeploymentStore>,
        runtime: Arc<dyn RuntimeStatsStore>,
        retry: RetryPolicy,
        page_size: u32,
    ) -> Self {
        Self {
            orchestrator: Orchestrator::new(engine.clone(), workflows, deployments),
            sync: SyncEngine::new(engine.clone(), runtime).with_page_size(page_size),
            validator,
            engine,
            retry,
        }
    }
}
