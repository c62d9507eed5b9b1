//! Error types for the engine client.
//!
//! Every failure talking to the engine is translated into `EngineError`, so
//! callers never see transport-specific error types.

use autoflow_workflow::ValidationResult;
use std::fmt;

/// Errors from execution engine operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// The document failed local validation and was not sent.
    ValidationFailed { validation: ValidationResult },
    /// The engine answered with a non-success status.
    Http { status: u16, message: String },
    /// No response arrived before the deadline.
    Timeout,
    /// The engine could not be reached.
    Connection { reason: String },
    /// The engine answered with a body that could not be understood.
    Decode { reason: String },
    /// The client configuration is unusable.
    InvalidConfig { reason: String },
}

impl EngineError {
    /// Returns the validation result for `ValidationFailed` errors.
    #[must_use]
    pub fn validation(&self) -> Option<&ValidationResult> {
        match self {
            Self::ValidationFailed { validation } => Some(validation),
            _ => None,
        }
    }

    /// Returns true for failures where retrying the same request may help.
    ///
    /// Client errors (4xx) and local validation failures are permanent.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout | Self::Connection { .. } => true,
            Self::Http { status, .. } => *status >= 500 || *status == 429,
            Self::ValidationFailed { .. } | Self::Decode { .. } | Self::InvalidConfig { .. } => {
                false
            }
        }
    }

    /// Message recorded on a failed deployment.
    #[must_use]
    pub fn deployment_message(&self) -> String {
        match self {
            Self::Http { status, message } if message.is_empty() => {
                format!("deployment failed (HTTP {status})")
            }
            other => other.to_string(),
        }
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ValidationFailed { .. } => write!(f, "Workflow validation failed"),
            Self::Http { status, message } => {
                if message.is_empty() {
                    write!(f, "engine returned HTTP {status}")
                } else {
                    write!(f, "{message}")
                }
            }
            Self::Timeout => write!(f, "request to execution engine timed out"),
            Self::Connection { reason } => {
                write!(f, "failed to reach execution engine: {reason}")
            }
            Self::Decode { reason } => {
                write!(f, "invalid response from execution engine: {reason}")
            }
            Self::InvalidConfig { reason } => {
                write!(f, "invalid engine configuration: {reason}")
            }
        }
    }
}

impl std::error::Error for EngineError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_error_shows_engine_message_verbatim() {
        let err = EngineError::Http {
            status: 400,
            message: "request/body must NOT have additional properties".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "request/body must NOT have additional properties"
        );
        assert_eq!(err.deployment_message(), err.to_string());
    }

    #[test]
    fn empty_http_message_falls_back_to_status() {
        let err = EngineError::Http {
            status: 502,
            message: String::new(),
        };
        assert!(err.to_string().contains("502"));
        assert_eq!(err.deployment_message(), "deployment failed (HTTP 502)");
    }

    #[test]
    fn validation_failure_carries_result() {
        let validation = ValidationResult {
            valid: false,
            errors: vec!["Workflow name is required".to_string()],
            ..Default::default()
        };
        let err = EngineError::ValidationFailed {
            validation: validation.clone(),
        };
        assert_eq!(err.to_string(), "Workflow validation failed");
        assert_eq!(err.validation(), Some(&validation));
        assert!(EngineError::Timeout.validation().is_none());
    }

    #[test]
    fn transient_classification() {
        assert!(EngineError::Timeout.is_transient());
        assert!(
            EngineError::Connection {
                reason: "refused".to_string()
            }
            .is_transient()
        );
        assert!(
            EngineError::Http {
                status: 503,
                message: String::new()
            }
            .is_transient()
        );
        assert!(
            !EngineError::Http {
                status: 404,
                message: String::new()
            }
            .is_transient()
        );
        assert!(
            !EngineError::ValidationFailed {
                validation: ValidationResult::default()
            }
            .is_transient()
        );
    }
}
