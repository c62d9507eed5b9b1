//! Edge types for workflow documents.
//!
//! Connections are stored per source node as a list of output ports, each
//! port holding the edges that leave it:
//!
//! ```json
//! { "1": { "main": [[{ "node": "2", "type": "main", "index": 0 }]] } }
//! ```

use serde::{Deserialize, Serialize};

/// The only connection kind the engine uses for data flow.
pub const MAIN_CONNECTION: &str = "main";

fn main_connection() -> String {
    MAIN_CONNECTION.to_string()
}

/// One directed connection from an output port to another node's input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    /// Id of the node this edge points at.
    #[serde(rename = "node")]
    pub target_node_id: String,
    /// Connection kind, always `"main"` for data edges.
    #[serde(rename = "type", default = "main_connection")]
    pub kind: String,
    /// Input index on the target node.
    #[serde(rename = "index", default)]
    pub port_index: u32,
}

impl Edge {
    /// Creates a main edge into the first input of `target_node_id`.
    #[must_use]
    pub fn to(target_node_id: impl Into<String>) -> Self {
        Self {
            target_node_id: target_node_id.into(),
            kind: main_connection(),
            port_index: 0,
        }
    }
}

/// Outgoing connections of a single node, grouped by output port.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeConnections {
    /// One entry per output port; each entry lists the edges leaving it.
    #[serde(default)]
    pub main: Vec<Vec<Edge>>,
}

impl NodeConnections {
    /// Iterates every edge across all output ports, in port order.
    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.main.iter().flatten()
    }
}
