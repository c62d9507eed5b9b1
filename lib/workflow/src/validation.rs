//! Static validation of workflow documents.
//!
//! Validation runs every phase in order and never stops early, so callers
//! see the complete set of problems in one pass:
//!
//! 1. Structural checks on the document as a whole
//! 2. Per-node checks (ids, names, types, positions, triggers)
//! 3. Type-specific parameter rules
//! 4. Connection references
//! 5. Reachability from trigger nodes
//! 6. Cycle detection
//! 7. Heuristic suggestions
//!
//! Only errors make a document invalid. Warnings and suggestions are
//! advisory.

use crate::definition::{MAX_NAME_LENGTH, WorkflowDocument};
use crate::graph::DocumentGraph;
use crate::node::{Node, NodeCategory};
use crate::registry::NodeTypeRegistry;
use crate::rules;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashSet;
use std::sync::Arc;

/// Node count above which a maintainability warning is emitted.
pub const LARGE_WORKFLOW_NODES: usize = 50;

/// Node count above which decomposition is suggested.
pub const DECOMPOSE_SUGGESTION_NODES: usize = 20;

/// HTTP request node count above which batching is suggested.
pub const MANY_HTTP_REQUESTS: usize = 10;

/// The verdict of validating a workflow document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    /// True iff `errors` is empty.
    pub valid: bool,
    /// Defects that block deployment.
    pub errors: Vec<String>,
    /// Problems that do not block deployment.
    pub warnings: Vec<String>,
    /// Improvement hints.
    pub suggestions: Vec<String>,
}

impl ValidationResult {
    /// Records an error.
    pub fn error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    /// Records a warning.
    pub fn warning(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    /// Records a suggestion.
    pub fn suggestion(&mut self, message: impl Into<String>) {
        self.suggestions.push(message.into());
    }

    /// Derives `valid` from the error list.
    #[must_use]
    fn finish(mut self) -> Self {
        self.valid = self.errors.is_empty();
        self
    }
}

/// Validates workflow documents against a node type registry.
///
/// Cheap to clone; the registry is shared.
#[derive(Debug, Clone)]
pub struct WorkflowValidator {
    registry: Arc<NodeTypeRegistry>,
}

impl WorkflowValidator {
    /// Creates a validator over the given registry.
    #[must_use]
    pub fn new(registry: Arc<NodeTypeRegistry>) -> Self {
        Self { registry }
    }

    /// Creates a validator over the built-in registry.
    #[must_use]
    pub fn builtin() -> Self {
        Self::new(Arc::new(NodeTypeRegistry::builtin()))
    }

    /// Returns the registry this validator consults.
    #[must_use]
    pub fn registry(&self) -> &NodeTypeRegistry {
        &self.registry
    }

    /// Validates a document.
    ///
    /// Pure: the same document always produces the same result.
    #[must_use]
    pub fn validate(&self, doc: &WorkflowDocument) -> ValidationResult {
        let mut result = ValidationResult::default();

        self.check_structure(doc, &mut result);
        let typed_nodes = self.check_nodes(doc, &mut result);
        self.check_parameters(&typed_nodes, &mut result);
        check_connections(doc, &mut result);

        let graph = DocumentGraph::from_document(doc);
        self.check_reachability(doc, &graph, &mut result);
        check_cycles(&graph, &mut result);
        self.suggest_improvements(&typed_nodes, &mut result);

        result.finish()
    }

    /// Validates a document that has not been decoded yet.
    ///
    /// A document whose top-level fields have the wrong JSON type cannot be
    /// decoded at all. Those problems come back as structural errors rather
    /// than a decode failure; a well-shaped document gets the full
    /// [`validate`](Self::validate) pass.
    #[must_use]
    pub fn validate_json(&self, value: &JsonValue) -> ValidationResult {
        let mut result = ValidationResult::default();
        let Some(object) = value.as_object() else {
            result.error("Workflow must be a JSON object");
            return result.finish();
        };

        match object.get("name") {
            None | Some(JsonValue::String(_)) => {}
            Some(JsonValue::Null) => result.error("Workflow name is required"),
            Some(_) => result.error("Workflow name must be a string"),
        }
        match object.get("nodes") {
            None => {}
            Some(JsonValue::Array(nodes)) => {
                for (index, node) in nodes.iter().enumerate() {
                    if !node.is_object() {
                        result.error(format!("Node at index {index} must be an object"));
                    }
                }
            }
            Some(_) => result.error("Workflow nodes must be an array"),
        }
        match object.get("connections") {
            None | Some(JsonValue::Object(_)) => {}
            Some(_) => result.error("Workflow connections must be an object"),
        }
        if !result.errors.is_empty() {
            return result.finish();
        }

        match WorkflowDocument::deserialize(value) {
            Ok(doc) => self.validate(&doc),
            Err(e) => {
                result.error(format!("Workflow document is malformed: {e}"));
                result.finish()
            }
        }
    }

    fn is_trigger(&self, node: &Node) -> bool {
        node.node_type()
            .and_then(|t| self.registry.category(t))
            .is_some_and(|c| c == NodeCategory::Trigger)
    }

    fn check_structure(&self, doc: &WorkflowDocument, result: &mut ValidationResult) {
        if doc.name.trim().is_empty() {
            result.error("Workflow name is required");
        } else if doc.name.chars().count() > MAX_NAME_LENGTH {
            result.error(format!(
                "Workflow name must be at most {MAX_NAME_LENGTH} characters"
            ));
        }

        let count = doc.nodes.len();
        if count == 0 {
            result.error("Workflow must contain at least one node");
        }
        if count > LARGE_WORKFLOW_NODES {
            result.warning(format!(
                "Workflow has {count} nodes; workflows with more than {LARGE_WORKFLOW_NODES} nodes are hard to maintain"
            ));
        }
        if count > DECOMPOSE_SUGGESTION_NODES {
            result.suggestion(format!(
                "Consider splitting this {count}-node workflow into smaller sub-workflows"
            ));
        }
    }

    /// Runs the per-node checks and returns the nodes that have both an id
    /// and a type, which are the only ones the parameter phase looks at.
    fn check_nodes<'d>(
        &self,
        doc: &'d WorkflowDocument,
        result: &mut ValidationResult,
    ) -> Vec<&'d Node> {
        let mut seen_ids = HashSet::new();
        let mut typed = Vec::with_capacity(doc.nodes.len());
        let mut has_trigger = false;

        for (index, node) in doc.nodes.iter().enumerate() {
            let Some(id) = node.id() else {
                result.error(format!("Node at index {index} is missing an id"));
                continue;
            };
            let Some(node_type) = node.node_type() else {
                result.error(format!("Node '{}' is missing a type", node.label()));
                continue;
            };

            if node.name().is_none() {
                result.error(format!("Node '{id}' is missing a name"));
            }
            if !seen_ids.insert(id) {
                result.error(format!("Duplicate node id '{id}'"));
            }

            match self.registry.get(node_type) {
                Some(info) => has_trigger |= info.is_trigger(),
                None => result.warning(format!(
                    "Node '{}' has unknown type '{node_type}'",
                    node.label()
                )),
            }

            if node.position().is_none() {
                result.warning(format!(
                    "Node '{}' has a missing or malformed position",
                    node.label()
                ));
            }

            typed.push(node);
        }

        if !doc.nodes.is_empty() && !has_trigger {
            result.warning("Workflow has no trigger node and cannot run automatically");
        }

        typed
    }

    fn check_parameters(&self, nodes: &[&Node], result: &mut ValidationResult) {
        for node in nodes {
            let rule = node
                .node_type()
                .and_then(|t| self.registry.canonical_id(t))
                .and_then(rules::rule_for);
            if let Some(rule) = rule {
                rule(node, result);
            }
        }
    }

    fn check_reachability(
        &self,
        doc: &WorkflowDocument,
        graph: &DocumentGraph<'_>,
        result: &mut ValidationResult,
    ) {
        // Without a trigger everything is unreachable; the node phase has
        // already warned about that.
        if !doc.nodes.iter().any(|n| self.is_trigger(n)) {
            return;
        }

        let unreachable: Vec<&str> = graph
            .unreachable_from(|n| self.is_trigger(n))
            .into_iter()
            .map(Node::label)
            .collect();

        if !unreachable.is_empty() {
            result.warning(format!(
                "Unreachable nodes (not connected to any trigger): {}",
                unreachable.join(", ")
            ));
        }
    }

    fn suggest_improvements(&self, nodes: &[&Node], result: &mut ValidationResult) {
        let http_requests = nodes
            .iter()
            .filter(|n| {
                n.node_type()
                    .and_then(|t| self.registry.canonical_id(t))
                    == Some("httpRequest")
            })
            .count();

        if http_requests > MANY_HTTP_REQUESTS {
            result.suggestion(format!(
                "Workflow makes {http_requests} HTTP requests; consider batching requests or caching responses"
            ));
        }
    }
}

fn check_connections(doc: &WorkflowDocument, result: &mut ValidationResult) {
    let known: HashSet<&str> = doc.nodes.iter().filter_map(Node::id).collect();

    for (source, connections) in &doc.connections {
        if !known.contains(source.as_str()) {
            result.error(format!(
                "Connection source '{source}' does not match any node"
            ));
        }
        for edge in connections.edges() {
            if !known.contains(edge.target_node_id.as_str()) {
                result.error(format!(
                    "Connection from '{source}' targets unknown node '{}'",
                    edge.target_node_id
                ));
            }
        }
    }
}

fn check_cycles(graph: &DocumentGraph<'_>, result: &mut ValidationResult) {
    if !graph.has_cycle() {
        return;
    }

    let members: Vec<&str> = graph
        .cycles()
        .into_iter()
        .flatten()
        .map(Node::label)
        .collect();

    result.error(format!(
        "Invalid graph: circular dependencies detected between nodes {}",
        members.join(", ")
    ));
}
