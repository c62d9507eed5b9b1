//! HTTP error mapping.
//!
//! Every failure leaves the service as `{ "success": false, "error": ... }`
//! with a status code chosen from the error's current context. Storage
//! failures are logged in full and reported to the caller without details.

use autoflow_deployment::{DeploymentError, SyncError};
use autoflow_engine::EngineError;
use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use rootcause::prelude::Report;
use serde::Serialize;
use std::fmt;

/// Body of every error response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub success: bool,
    pub error: String,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
        }
    }
}

/// Errors returned by API handlers.
#[derive(Debug)]
pub enum ApiError {
    /// A path parameter is not a valid identifier.
    InvalidId { value: String },
    /// The request body could not be read as JSON of the expected shape.
    InvalidBody { status: StatusCode, reason: String },
    /// An orchestrator operation failed.
    Deployment(Report<DeploymentError>),
    /// A sync operation failed.
    Sync(Report<SyncError>),
    /// A direct engine call failed.
    Engine(EngineError),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidId { value } => write!(f, "invalid id '{value}'"),
            Self::InvalidBody { reason, .. } => write!(f, "invalid request body: {reason}"),
            Self::Deployment(report) => write!(f, "{}", report.current_context()),
            Self::Sync(report) => write!(f, "{}", report.current_context()),
            Self::Engine(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<Report<DeploymentError>> for ApiError {
    fn from(report: Report<DeploymentError>) -> Self {
        Self::Deployment(report)
    }
}

impl From<Report<SyncError>> for ApiError {
    fn from(report: Report<SyncError>) -> Self {
        Self::Sync(report)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::InvalidBody {
            status: rejection.status(),
            reason: rejection.body_text(),
        }
    }
}

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        Self::Engine(e)
    }
}

/// Status code for an engine failure.
pub(crate) fn engine_status(e: &EngineError) -> StatusCode {
    match e {
        EngineError::ValidationFailed { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        EngineError::Timeout => StatusCode::GATEWAY_TIMEOUT,
        EngineError::InvalidConfig { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        EngineError::Http { .. } | EngineError::Connection { .. } | EngineError::Decode { .. } => {
            StatusCode::BAD_GATEWAY
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::InvalidId { .. } => (StatusCode::BAD_REQUEST, self.to_string()),
            Self::InvalidBody { status, .. } => (*status, self.to_string()),
            Self::Deployment(report) => match report.current_context() {
                DeploymentError::WorkflowNotFound { .. }
                | DeploymentError::DeploymentNotFound { .. } => {
                    (StatusCode::NOT_FOUND, self.to_string())
                }
                DeploymentError::DuplicateVersion { .. }
                | DeploymentError::InvalidStateTransition { .. }
                | DeploymentError::NotDeployed { .. }
                | DeploymentError::ConcurrentUpdate { .. } => {
                    (StatusCode::CONFLICT, self.to_string())
                }
                DeploymentError::Engine(e) => (engine_status(e), self.to_string()),
                DeploymentError::Persistence => {
                    tracing::error!("deployment storage failure: {report:?}");
                    (StatusCode::INTERNAL_SERVER_ERROR, "Internal error".to_string())
                }
            },
            Self::Sync(report) => match report.current_context() {
                SyncError::WorkflowNotFound { .. } => (StatusCode::NOT_FOUND, self.to_string()),
                SyncError::NotDeployed { .. } => (StatusCode::CONFLICT, self.to_string()),
                SyncError::Engine(e) => (engine_status(e), self.to_string()),
                SyncError::Persistence => {
                    tracing::error!("sync storage failure: {report:?}");
                    (StatusCode::INTERNAL_SERVER_ERROR, "Internal error".to_string())
                }
            },
            Self::Engine(e) => {
                tracing::warn!(error = %e, "engine request failed");
                (engine_status(e), self.to_string())
            }
        };

        (status, Json(ErrorBody::new(message))).into_response()
    }
}
