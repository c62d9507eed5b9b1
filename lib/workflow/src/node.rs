//! Workflow node types.
//!
//! A node is one step of a workflow graph. The engine identifies a node's
//! behaviour by its `type` string; the parameters object is interpreted
//! according to that type.
//!
//! Nodes are deserialized leniently: `id`, `name`, `type` and `position` may
//! all be absent so that the validator can report every defect of a proposed
//! document instead of failing on the first missing field.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::fmt;

/// The category of a node type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeCategory {
    /// Entry points that start an execution without upstream input.
    Trigger,
    /// Calls to external services (HTTP, email, chat).
    Action,
    /// Data reshaping.
    Transform,
    /// Branching, merging and waiting.
    Logic,
    /// User-supplied code.
    Code,
    /// Terminal steps (webhook responses, no-ops).
    Output,
}

impl NodeCategory {
    /// Returns the wire name of the category.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trigger => "trigger",
            Self::Action => "action",
            Self::Transform => "transform",
            Self::Logic => "logic",
            Self::Code => "code",
            Self::Output => "output",
        }
    }
}

impl fmt::Display for NodeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A workflow node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    /// Unique identifier within the document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Human-readable name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Registry key identifying the node's behaviour.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub node_type: Option<String>,
    /// Type-specific parameters.
    #[serde(default)]
    pub parameters: Map<String, JsonValue>,
    /// Canvas position; display-only. Kept raw so malformed values survive
    /// deserialization and can be reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<JsonValue>,
    /// Engine-side version of the node type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_version: Option<JsonValue>,
}

impl Node {
    /// Creates a node with the given id, name and type at the origin.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        node_type: impl Into<String>,
    ) -> Self {
        Self {
            id: Some(id.into()),
            name: Some(name.into()),
            node_type: Some(node_type.into()),
            parameters: Map::new(),
            position: Some(serde_json::json!([0, 0])),
            type_version: None,
        }
    }

    /// Adds a parameter.
    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: JsonValue) -> Self {
        self.parameters.insert(key.into(), value);
        self
    }

    /// Returns the id if present and non-empty.
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref().filter(|id| !id.is_empty())
    }

    /// Returns the type if present and non-empty.
    #[must_use]
    pub fn node_type(&self) -> Option<&str> {
        self.node_type.as_deref().filter(|t| !t.is_empty())
    }

    /// Returns the name if present and non-empty.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref().filter(|n| !n.is_empty())
    }

    /// Returns the label used in diagnostics: the name, else the id.
    #[must_use]
    pub fn label(&self) -> &str {
        self.name().or_else(|| self.id()).unwrap_or("<unnamed>")
    }

    /// Returns the position when it is a two-element numeric array.
    #[must_use]
    pub fn position(&self) -> Option<[f64; 2]> {
        match self.position.as_ref()?.as_array()?.as_slice() {
            [x, y] => Some([x.as_f64()?, y.as_f64()?]),
            _ => None,
        }
    }

    /// Returns a string parameter, if present.
    #[must_use]
    pub fn str_param(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).and_then(JsonValue::as_str)
    }
}
