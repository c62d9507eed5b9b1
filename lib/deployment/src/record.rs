//! Deployment and workflow records.
//!
//! A deployment record tracks one attempt to push one version of a workflow
//! to the engine:
//!
//! ```text
//! pending -> deploying -> deployed -> rolled_back
//!                     \-> failed
//! ```
//!
//! Transitions are enforced here; stores persist whatever the record says.

use crate::error::DeploymentError;
use crate::stats::WorkflowRuntimeStats;
use autoflow_core::{DeploymentId, UserId, WorkflowId};
use autoflow_workflow::WorkflowDocument;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use std::str::FromStr;

/// Status of a deployment record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentStatus {
    Pending,
    Deploying,
    Deployed,
    Failed,
    RolledBack,
}

impl DeploymentStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Deploying => "deploying",
            Self::Deployed => "deployed",
            Self::Failed => "failed",
            Self::RolledBack => "rolled_back",
        }
    }

    /// Returns true if `next` is a legal successor of this status.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Deploying)
                | (Self::Deploying, Self::Deployed)
                | (Self::Deploying, Self::Failed)
                | (Self::Deployed, Self::RolledBack)
        )
    }

    /// Returns true once the attempt has finished, successfully or not.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Deployed | Self::Failed | Self::RolledBack)
    }
}

impl fmt::Display for DeploymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeploymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "deploying" => Ok(Self::Deploying),
            "deployed" => Ok(Self::Deployed),
            "failed" => Ok(Self::Failed),
            "rolled_back" => Ok(Self::RolledBack),
            other => Err(format!("unknown deployment status '{other}'")),
        }
    }
}

/// Deployment status as shown on the workflow itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    #[default]
    Draft,
    Deploying,
    Deployed,
    Failed,
    RolledBack,
}

impl WorkflowStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Deploying => "deploying",
            Self::Deployed => "deployed",
            Self::Failed => "failed",
            Self::RolledBack => "rolled_back",
        }
    }
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkflowStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "deploying" => Ok(Self::Deploying),
            "deployed" => Ok(Self::Deployed),
            "failed" => Ok(Self::Failed),
            "rolled_back" => Ok(Self::RolledBack),
            other => Err(format!("unknown workflow status '{other}'")),
        }
    }
}

/// One attempt to deploy one version of a workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentRecord {
    pub id: DeploymentId,
    pub workflow_id: WorkflowId,
    pub engine_workflow_id: Option<String>,
    /// Starts at 1 and only grows for a given workflow.
    pub version: u32,
    pub status: DeploymentStatus,
    pub actor_id: UserId,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<i64>,
    pub error_message: Option<String>,
    pub engine_response: Option<JsonValue>,
}

impl DeploymentRecord {
    /// Creates a pending record.
    #[must_use]
    pub fn pending(workflow_id: WorkflowId, version: u32, actor_id: UserId) -> Self {
        Self {
            id: DeploymentId::new(),
            workflow_id,
            engine_workflow_id: None,
            version,
            status: DeploymentStatus::Pending,
            actor_id,
            started_at: Utc::now(),
            completed_at: None,
            duration_ms: None,
            error_message: None,
            engine_response: None,
        }
    }

    fn transition(&mut self, next: DeploymentStatus) -> Result<(), DeploymentError> {
        if !self.status.can_transition_to(next) {
            return Err(DeploymentError::InvalidStateTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    fn complete(&mut self, at: DateTime<Utc>) {
        self.completed_at = Some(at);
        self.duration_ms = Some((at - self.started_at).num_milliseconds().max(0));
    }

    /// `pending -> deploying`.
    pub fn begin(&mut self) -> Result<(), DeploymentError> {
        self.transition(DeploymentStatus::Deploying)
    }

    /// `deploying -> deployed`.
    pub fn succeed(
        &mut self,
        engine_workflow_id: impl Into<String>,
        engine_response: JsonValue,
        at: DateTime<Utc>,
    ) -> Result<(), DeploymentError> {
        self.transition(DeploymentStatus::Deployed)?;
        self.engine_workflow_id = Some(engine_workflow_id.into());
        self.engine_response = Some(engine_response);
        self.complete(at);
        Ok(())
    }

    /// `deploying -> failed`.
    pub fn fail(
        &mut self,
        message: impl Into<String>,
        at: DateTime<Utc>,
    ) -> Result<(), DeploymentError> {
        self.transition(DeploymentStatus::Failed)?;
        self.error_message = Some(message.into());
        self.complete(at);
        Ok(())
    }

    /// `deployed -> rolled_back`. Completion time and duration keep
    /// describing the original deployment.
    pub fn roll_back(&mut self) -> Result<(), DeploymentError> {
        self.transition(DeploymentStatus::RolledBack)
    }
}

/// A persisted workflow as this crate sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowRecord {
    pub id: WorkflowId,
    pub owner_id: UserId,
    pub name: String,
    pub document: WorkflowDocument,
    pub version: u32,
    pub deployment_status: WorkflowStatus,
    pub engine_workflow_id: Option<String>,
    pub runtime_stats: WorkflowRuntimeStats,
}

impl WorkflowRecord {
    /// Creates a draft workflow at version 1.
    #[must_use]
    pub fn draft(owner_id: UserId, document: WorkflowDocument) -> Self {
        Self {
            id: WorkflowId::new(),
            owner_id,
            name: document.name.clone(),
            document,
            version: 1,
            deployment_status: WorkflowStatus::Draft,
            engine_workflow_id: None,
            runtime_stats: WorkflowRuntimeStats::default(),
        }
    }
}
