//! Compiled graph structure
//!
//! A [`Graph`] is the immutable product of
//! [`GraphBuilder::build`](crate::builder::GraphBuilder::build): the node
//! registry, each node's outgoing [`EdgeGroup`], error-designated edges, and
//! the start node. Executions only read it, so one graph serves any number
//! of concurrent runs.

use crate::edge::EdgeGroup;
use crate::node::{Node, NodeId};
use std::collections::HashMap;

/// Validated, immutable graph: nodes, edges, error edges, start node
#[derive(Debug, Clone)]
pub struct Graph {
    pub(crate) nodes: HashMap<NodeId, Node>,
    pub(crate) edges: HashMap<NodeId, EdgeGroup>,
    pub(crate) error_edges: HashMap<NodeId, NodeId>,
    pub(crate) start: NodeId,
}

impl Graph {
    /// Entry node id
    pub fn start(&self) -> &NodeId {
        &self.start
    }

    /// Look up a node by id
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Number of registered nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// A node's outgoing edge group, if it has one
    pub fn outgoing(&self, id: &str) -> Option<&EdgeGroup> {
        self.edges.get(id)
    }

    /// Error-designated fallback target for a node, if configured
    pub fn error_edge(&self, id: &str) -> Option<&NodeId> {
        self.error_edges.get(id)
    }
}
