//! Deployment orchestration and runtime reconciliation.
//!
//! This crate provides:
//!
//! - **Deployment Records**: the per-version lifecycle state machine
//! - **Orchestrator**: deploys, rolls back and reaps stuck deployments
//! - **Sync Engine**: mirrors engine execution history into runtime stats
//! - **Retry Policy**: caller-level retry of transient deploy failures
//! - **Stores**: the persistence traits the server implements

pub mod error;
pub mod orchestrator;
pub mod record;
pub mod retry;
pub mod stats;
pub mod store;
pub mod sync;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{DeploymentError, StoreError, SyncError};
pub use orchestrator::{DeploymentOutcome, Orchestrator};
pub use record::{DeploymentRecord, DeploymentStatus, WorkflowRecord, WorkflowStatus};
pub use retry::RetryPolicy;
pub use stats::{SyncLogEntry, WorkflowRuntimeStats};
pub use store::{DeploymentStore, RuntimeStatsStore, SyncTarget, WorkflowStore};
pub use sync::{DEFAULT_EXECUTION_PAGE, SyncEngine, SyncOutcome};
