//! Error types for the deployment crate.
//!
//! Errors are designed for layered context using rootcause:
//! - `StoreError`: Errors from persistence backends
//! - `DeploymentError`: Errors from orchestrator operations
//! - `SyncError`: Errors from runtime reconciliation

use crate::record::DeploymentStatus;
use autoflow_core::WorkflowId;
use autoflow_engine::EngineError;
use std::fmt;

/// Errors from storage operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The database rejected or failed the operation.
    Database { details: String },
    /// A stored row could not be turned back into a domain value.
    InvalidData { details: String },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Database { details } => write!(f, "database error: {details}"),
            Self::InvalidData { details } => write!(f, "invalid stored data: {details}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Errors from deployment operations.
///
/// Engine failures during `deploy` are not errors: they are recorded on the
/// deployment row and returned in the outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeploymentError {
    /// The workflow does not exist.
    WorkflowNotFound { id: WorkflowId },
    /// No deployment exists for this workflow version.
    DeploymentNotFound { workflow_id: WorkflowId, version: u32 },
    /// A deployment for this workflow version already exists.
    DuplicateVersion { workflow_id: WorkflowId, version: u32 },
    /// The record is not in a state that allows the requested change.
    InvalidStateTransition {
        from: DeploymentStatus,
        to: DeploymentStatus,
    },
    /// The workflow has never been created on the engine.
    NotDeployed { id: WorkflowId },
    /// The stored record changed status while this operation held a copy.
    ConcurrentUpdate { workflow_id: WorkflowId, version: u32 },
    /// The engine rejected an operation other than `deploy`.
    Engine(EngineError),
    /// Storage context (use as context wrapper).
    Persistence,
}

impl fmt::Display for DeploymentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WorkflowNotFound { id } => write!(f, "workflow not found: {id}"),
            Self::DeploymentNotFound {
                workflow_id,
                version,
            } => write!(f, "no deployment of {workflow_id} version {version}"),
            Self::DuplicateVersion {
                workflow_id,
                version,
            } => write!(
                f,
                "version {version} of {workflow_id} has already been deployed or is deploying"
            ),
            Self::InvalidStateTransition { from, to } => {
                write!(f, "cannot move deployment from {from} to {to}")
            }
            Self::NotDeployed { id } => write!(f, "workflow {id} is not deployed"),
            Self::ConcurrentUpdate {
                workflow_id,
                version,
            } => write!(
                f,
                "deployment of {workflow_id} version {version} was changed by another operation"
            ),
            Self::Engine(e) => write!(f, "{e}"),
            Self::Persistence => write!(f, "failed to persist deployment state"),
        }
    }
}

impl std::error::Error for DeploymentError {}

impl From<EngineError> for DeploymentError {
    fn from(e: EngineError) -> Self {
        Self::Engine(e)
    }
}

/// Errors from sync operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// The workflow does not exist.
    WorkflowNotFound { id: WorkflowId },
    /// The workflow has no engine counterpart to read executions from.
    NotDeployed { id: WorkflowId },
    /// Fetching executions failed.
    Engine(EngineError),
    /// Storage context (use as context wrapper).
    Persistence,
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WorkflowNotFound { id } => write!(f, "workflow not found: {id}"),
            Self::NotDeployed { id } => write!(f, "workflow {id} is not deployed"),
            Self::Engine(e) => write!(f, "failed to fetch executions: {e}"),
            Self::Persistence => write!(f, "failed to persist sync state"),
        }
    }
}

impl std::error::Error for SyncError {}

impl From<EngineError> for SyncError {
    fn from(e: EngineError) -> Self {
        Self::Engine(e)
    }
}
