//! PostgreSQL repositories for the autoflow service.
//!
//! This module provides the storage backends for:
//! - Workflows and their deployment columns
//! - Deployment records and first-deployment milestones
//! - Runtime stats and the sync log

pub mod deployment;
pub mod runtime;
pub mod workflow;

pub use deployment::DeploymentRepository;
pub use runtime::RuntimeRepository;
pub use workflow::WorkflowRepository;

use autoflow_deployment::StoreError;

/// Maps a sqlx failure onto the storage error taxonomy.
pub(crate) fn store_error(e: sqlx::Error) -> StoreError {
    match e {
        sqlx::Error::Decode(_) | sqlx::Error::ColumnDecode { .. } => StoreError::InvalidData {
            details: e.to_string(),
        },
        _ => StoreError::Database {
            details: e.to_string(),
        },
    }
}

/// Builds the decode error used when a stored value cannot be parsed.
pub(crate) fn decode_error(what: &str, value: &str, e: impl std::fmt::Display) -> sqlx::Error {
    sqlx::Error::Decode(Box::new(std::io::Error::new(
        std::io::ErrorKind::InvalidData,
        format!("invalid {what} '{value}': {e}"),
    )))
}

/// Converts a version number into its column type.
pub(crate) fn version_column(version: u32) -> Result<i32, StoreError> {
    i32::try_from(version).map_err(|_| StoreError::InvalidData {
        details: format!("version {version} does not fit the version column"),
    })
}

/// Converts a stored version back into a version number.
pub(crate) fn version_from_column(version: i32) -> Result<u32, sqlx::Error> {
    u32::try_from(version).map_err(|e| decode_error("version", &version.to_string(), e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_failures_are_invalid_data() {
        let err = store_error(decode_error("workflow id", "nope", "bad prefix"));
        assert!(matches!(err, StoreError::InvalidData { details } if details.contains("nope")));
    }

    #[test]
    fn other_failures_are_database_errors() {
        assert!(matches!(
            store_error(sqlx::Error::RowNotFound),
            StoreError::Database { .. }
        ));
    }

    #[test]
    fn versions_round_trip_through_columns() {
        assert_eq!(version_column(7).unwrap(), 7);
        assert!(version_column(u32::MAX).is_err());
        assert_eq!(version_from_column(3).unwrap(), 3);
        assert!(version_from_column(-1).is_err());
    }
}
