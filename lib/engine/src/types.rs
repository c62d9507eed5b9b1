//! Values returned by the execution engine.

use autoflow_workflow::ValidationResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value as JsonValue;

/// Result of probing the engine's API with the configured credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStatus {
    /// Number of workflows in the first page of the listing.
    pub workflow_count: usize,
}

/// A workflow created on the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct DeployedWorkflow {
    /// Identifier the engine assigned.
    pub engine_workflow_id: String,
    /// Whether the workflow is active on the engine.
    pub active: bool,
    /// Why a requested activation did not happen. The workflow still exists
    /// on the engine, inactive.
    pub activation_error: Option<String>,
    /// The engine's response body.
    pub response: JsonValue,
    /// Validation result computed before sending.
    pub validation: ValidationResult,
}

/// Outcome of a health check. Never an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthStatus {
    pub healthy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HealthStatus {
    #[must_use]
    pub fn healthy() -> Self {
        Self {
            healthy: true,
            error: None,
        }
    }

    #[must_use]
    pub fn unhealthy(error: impl Into<String>) -> Self {
        Self {
            healthy: false,
            error: Some(error.into()),
        }
    }
}

/// Execution status as reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Success,
    Error,
    Crashed,
    Canceled,
    Running,
    Waiting,
    New,
    #[serde(other)]
    Unknown,
}

impl ExecutionStatus {
    /// Returns the wire name of this status.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
            Self::Crashed => "crashed",
            Self::Canceled => "canceled",
            Self::Running => "running",
            Self::Waiting => "waiting",
            Self::New => "new",
            Self::Unknown => "unknown",
        }
    }

    /// Returns true for statuses that will not change any more.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Success | Self::Error | Self::Crashed | Self::Canceled
        )
    }
}

/// One execution record from the engine.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineExecution {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default, deserialize_with = "optional_string_or_number")]
    pub workflow_id: Option<String>,
    #[serde(default)]
    pub finished: bool,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub stopped_at: Option<DateTime<Utc>>,
    /// Older engine versions omit the status.
    #[serde(default)]
    pub status: Option<ExecutionStatus>,
}

impl EngineExecution {
    /// The effective status, inferred from `finished`/`stoppedAt` when the
    /// engine did not report one.
    #[must_use]
    pub fn outcome(&self) -> ExecutionStatus {
        match self.status {
            Some(status) => status,
            None if self.finished => ExecutionStatus::Success,
            None if self.stopped_at.is_some() => ExecutionStatus::Error,
            None => ExecutionStatus::Running,
        }
    }

    /// Returns true once the execution has stopped.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.stopped_at.is_some() && self.outcome().is_terminal()
    }

    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.outcome() == ExecutionStatus::Success
    }
}

/// Renders a JSON id as a string. The engine uses numbers for execution ids
/// and strings for workflow ids depending on version.
pub(crate) fn id_to_string(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) if !s.is_empty() => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = JsonValue::deserialize(deserializer)?;
    id_to_string(&value).ok_or_else(|| serde::de::Error::custom("expected a string or number id"))
}

fn optional_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<JsonValue>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(id_to_string))
}
