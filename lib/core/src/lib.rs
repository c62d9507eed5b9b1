//! Core types shared by every autoflow crate.
//!
//! This crate provides the strongly-typed identifiers and the error
//! handling foundation used by the validation, engine, and deployment
//! layers.

pub mod error;
pub mod id;

pub use error::Result;
pub use id::{DeploymentId, ParseIdError, SyncLogId, UserId, WorkflowId};
