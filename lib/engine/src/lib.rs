//! Client for the external workflow execution engine.
//!
//! The engine is an opaque collaborator reachable only over HTTP. This crate
//! provides:
//!
//! - **ExecutionEngine**: the trait the orchestrator and sync engine depend on
//! - **EngineClient**: the reqwest implementation, which validates documents
//!   before creating them on the engine
//! - **EngineError**: uniform translation of every transport failure

pub mod client;
pub mod config;
pub mod error;
pub mod types;

pub use client::{EngineClient, ExecutionEngine};
pub use config::EngineConfig;
pub use error::EngineError;
pub use types::{ConnectionStatus, DeployedWorkflow, EngineExecution, ExecutionStatus, HealthStatus};
