//! Workflow document types.
//!
//! A workflow document is the unit that is validated and pushed to the
//! execution engine: a name, a list of nodes and the connections between
//! them, plus opaque settings that are passed through untouched.

use crate::edge::NodeConnections;
use crate::node::Node;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

/// Maximum length of a workflow name, in characters.
pub const MAX_NAME_LENGTH: usize = 255;

/// A workflow document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowDocument {
    /// Engine-assigned identifier; absent until first deployed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Human-readable name.
    #[serde(default)]
    pub name: String,
    /// Nodes in display order. Order carries no meaning.
    #[serde(default)]
    pub nodes: Vec<Node>,
    /// Outgoing connections keyed by source node id.
    ///
    /// A `BTreeMap` keeps iteration order stable, which keeps validator
    /// output deterministic.
    #[serde(default)]
    pub connections: BTreeMap<String, NodeConnections>,
    /// Engine settings blob.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<JsonValue>,
    /// Engine static data blob.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub static_data: Option<JsonValue>,
}

impl WorkflowDocument {
    /// Creates an empty document with the given name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Adds a node.
    #[must_use]
    pub fn with_node(mut self, node: Node) -> Self {
        self.nodes.push(node);
        self
    }

    /// Connects `source` to `target` on the first output port of `source`.
    #[must_use]
    pub fn connect(mut self, source: impl Into<String>, target: impl Into<String>) -> Self {
        let connections = self.connections.entry(source.into()).or_default();
        if connections.main.is_empty() {
            connections.main.push(Vec::new());
        }
        connections.main[0].push(crate::edge::Edge::to(target));
        self
    }

    /// Returns the number of nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_engine_document() {
        let doc: WorkflowDocument = serde_json::from_value(serde_json::json!({
            "name": "T",
            "nodes": [
                { "id": "1", "name": "W", "type": "webhook" },
                { "id": "2", "name": "H", "type": "httpRequest", "parameters": { "url": "not a url" } }
            ],
            "connections": { "1": { "main": [[{ "node": "2", "type": "main", "index": 0 }]] } },
            "staticData": { "lastId": 4 }
        }))
        .expect("deserialize");

        assert_eq!(doc.name, "T");
        assert_eq!(doc.node_count(), 2);
        assert_eq!(doc.connections["1"].main[0][0].target_node_id, "2");
        assert_eq!(doc.static_data, Some(serde_json::json!({ "lastId": 4 })));
        assert!(doc.settings.is_none());
    }

    #[test]
    fn connect_appends_to_first_port() {
        let doc = WorkflowDocument::new("wf")
            .with_node(Node::new("a", "A", "manualTrigger"))
            .with_node(Node::new("b", "B", "set"))
            .with_node(Node::new("c", "C", "set"))
            .connect("a", "b")
            .connect("a", "c");

        let targets: Vec<_> = doc.connections["a"]
            .edges()
            .map(|e| e.target_node_id.clone())
            .collect();
        assert_eq!(targets, ["b", "c"]);
        assert_eq!(doc.connections["a"].main.len(), 1);
    }

    #[test]
    fn static_data_serializes_camel_case() {
        let doc = WorkflowDocument {
            static_data: Some(serde_json::json!({})),
            ..WorkflowDocument::new("wf")
        };
        let json = serde_json::to_value(&doc).expect("serialize");
        assert!(json.get("staticData").is_some());
        assert!(json.get("id").is_none());
    }
}
