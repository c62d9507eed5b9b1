//! Graph view of a workflow document using petgraph.
//!
//! Workflow documents store connections as a map keyed by node id. For
//! traversal they are loaded into a directed graph where:
//! - Nodes are the document's nodes with a usable, unique id
//! - Edges are connections whose source and target both resolve
//!
//! Dangling connections and nodes without ids are left out here; reporting
//! them is the validator's job.

use crate::definition::WorkflowDocument;
use crate::node::Node;
use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{HashMap, HashSet, VecDeque};

/// A borrowed, directed graph over a workflow document.
#[derive(Debug)]
pub struct DocumentGraph<'a> {
    graph: DiGraph<&'a Node, ()>,
    /// Map from node id to petgraph's NodeIndex for O(1) lookup.
    node_index_map: HashMap<&'a str, NodeIndex>,
}

impl<'a> DocumentGraph<'a> {
    /// Builds the graph for a document.
    ///
    /// When ids collide, the first node with a given id wins.
    #[must_use]
    pub fn from_document(doc: &'a WorkflowDocument) -> Self {
        let mut graph = DiGraph::new();
        let mut node_index_map = HashMap::new();

        for node in &doc.nodes {
            let Some(id) = node.id() else {
                continue;
            };
            if node_index_map.contains_key(id) {
                continue;
            }
            let index = graph.add_node(node);
            node_index_map.insert(id, index);
        }

        for (source_id, connections) in &doc.connections {
            let Some(&source) = node_index_map.get(source_id.as_str()) else {
                continue;
            };
            for edge in connections.edges() {
                if let Some(&target) = node_index_map.get(edge.target_node_id.as_str()) {
                    graph.add_edge(source, target, ());
                }
            }
        }

        Self {
            graph,
            node_index_map,
        }
    }

    /// Returns the number of nodes in the graph.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Returns the number of edges in the graph.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Returns true if a node with this id is part of the graph.
    #[must_use]
    pub fn contains(&self, node_id: &str) -> bool {
        self.node_index_map.contains_key(node_id)
    }

    /// Breadth-first traversal from every node matching `is_start`.
    ///
    /// Returns the ids of all visited nodes, starts included.
    pub fn reachable_from(&self, is_start: impl Fn(&Node) -> bool) -> HashSet<&'a str> {
        let mut visited = HashSet::new();
        let mut queue: VecDeque<NodeIndex> = self
            .graph
            .node_indices()
            .filter(|&idx| is_start(self.graph[idx]))
            .collect();

        for &idx in &queue {
            visited.insert(idx);
        }

        while let Some(idx) = queue.pop_front() {
            for next in self.graph.neighbors_directed(idx, Direction::Outgoing) {
                if visited.insert(next) {
                    queue.push_back(next);
                }
            }
        }

        visited
            .into_iter()
            .filter_map(|idx| {
                let node: &'a Node = self.graph[idx];
                node.id()
            })
            .collect()
    }

    /// Nodes not reachable from any node matching `is_start`, in document
    /// order.
    pub fn unreachable_from(&self, is_start: impl Fn(&Node) -> bool) -> Vec<&'a Node> {
        let reachable = self.reachable_from(is_start);
        self.graph
            .node_indices()
            .map(|idx| self.graph[idx])
            .filter(|node| node.id().is_some_and(|id| !reachable.contains(id)))
            .collect()
    }

    /// Returns true if the graph contains a directed cycle.
    #[must_use]
    pub fn has_cycle(&self) -> bool {
        petgraph::algo::is_cyclic_directed(&self.graph)
    }

    /// Returns the groups of nodes that form cycles.
    ///
    /// Each group is a strongly connected component with more than one node,
    /// or a single node with an edge to itself. Groups and their members are
    /// in document order.
    #[must_use]
    pub fn cycles(&self) -> Vec<Vec<&'a Node>> {
        let mut groups: Vec<Vec<NodeIndex>> = petgraph::algo::tarjan_scc(&self.graph)
            .into_iter()
            .filter(|component| match component.as_slice() {
                [single] => self.graph.contains_edge(*single, *single),
                _ => true,
            })
            .collect();

        for group in &mut groups {
            group.sort_unstable();
        }
        groups.sort_unstable_by_key(|group| group[0]);

        groups
            .into_iter()
            .map(|group| group.into_iter().map(|idx| self.graph[idx]).collect())
            .collect()
    }
}
