//! Workflow documents and their static validation.
//!
//! This crate provides:
//!
//! - **Document Model**: workflow documents, nodes and connections in the
//!   execution engine's JSON shape
//! - **Node Type Registry**: the read-only catalog of known node types
//! - **Graph View**: petgraph-backed traversal for reachability and cycles
//! - **Validator**: the pure, multi-phase validation pass run before any
//!   document is sent to the engine

pub mod definition;
pub mod edge;
pub mod graph;
pub mod node;
pub mod registry;
pub mod rules;
pub mod validation;

pub use definition::{MAX_NAME_LENGTH, WorkflowDocument};
pub use edge::{Edge, NodeConnections};
pub use graph::DocumentGraph;
pub use node::{Node, NodeCategory};
pub use registry::{NodeTypeInfo, NodeTypeRegistry};
pub use validation::{ValidationResult, WorkflowValidator};
