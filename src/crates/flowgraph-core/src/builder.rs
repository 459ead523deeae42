//! Graph construction surface
//!
//! [`GraphBuilder`] is the build-time API: register nodes, wire edges
//! (guarded, unconditional, error-designated), declare parallel groups and
//! bounded loops, pick the start node, then [`build`](GraphBuilder::build)
//! into an immutable [`Executor`]. Everything structural is validated at
//! build time so runs never trip over dangling references:
//!
//! - the start node is set and registered,
//! - every edge endpoint is registered,
//! - node ids are unique,
//! - an unconditional, unbounded edge is the *last* of its node's edges
//!   (anywhere earlier it would short-circuit its guarded siblings — this
//!   ordering rule is a correctness invariant of first-match routing),
//! - parallel groups have registered branches and join, a satisfiable
//!   quorum, and no nested parallel group reachable before the join.
//!
//! # Example
//!
//! ```rust
//! use flowgraph_core::builder::GraphBuilder;
//! use flowgraph_core::node::Node;
//! use flowgraph_core::state::State;
//! use serde_json::json;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut builder = GraphBuilder::new();
//! builder
//!     .add_node(Node::from_fn("start", |mut state| async move {
//!         state.set("age", json!(17));
//!         Ok(state)
//!     }))
//!     .add_node(Node::from_fn("adult", |state| async move { Ok(state) }))
//!     .add_node(Node::from_fn("minor", |state| async move { Ok(state) }))
//!     .add_conditional_edge("start", "adult", |s: &State| {
//!         s.get_i64("age").map(|age| age >= 18).unwrap_or(false)
//!     })
//!     .add_edge("start", "minor")
//!     .set_start("start");
//!
//! let executor = builder.build()?;
//! let report = executor.invoke(State::new()).await?;
//! assert_eq!(report.path, vec!["start".to_string(), "minor".to_string()]);
//! # Ok(())
//! # }
//! ```

use crate::checkpoint::CheckpointManager;
use crate::edge::{Edge, EdgeGroup, JoinPolicy};
use crate::error::{GraphError, Result};
use crate::events::EventBus;
use crate::executor::{ExecutionConfig, Executor};
use crate::graph::Graph;
use crate::node::{Node, NodeId};
use crate::state::State;
use flowgraph_checkpoint::CheckpointStore;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Builder for executable graphs
pub struct GraphBuilder {
    nodes: HashMap<NodeId, Node>,
    duplicate_nodes: Vec<NodeId>,
    first_match: HashMap<NodeId, Vec<Edge>>,
    parallel: HashMap<NodeId, (Vec<Edge>, NodeId, JoinPolicy)>,
    error_edges: HashMap<NodeId, NodeId>,
    start: Option<NodeId>,
    config: ExecutionConfig,
    event_capacity: usize,
    checkpoint_store: Option<Arc<dyn CheckpointStore>>,
}

impl GraphBuilder {
    /// Create an empty builder with default configuration
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            duplicate_nodes: Vec::new(),
            first_match: HashMap::new(),
            parallel: HashMap::new(),
            error_edges: HashMap::new(),
            start: None,
            config: ExecutionConfig::default(),
            event_capacity: 256,
            checkpoint_store: None,
        }
    }

    /// Register a node; ids must be unique
    pub fn add_node(&mut self, node: Node) -> &mut Self {
        if self.nodes.contains_key(&node.id) {
            self.duplicate_nodes.push(node.id.clone());
        }
        self.nodes.insert(node.id.clone(), node);
        self
    }

    /// Add an unconditional edge
    ///
    /// Always matches, so it must be the last edge registered on `source`.
    pub fn add_edge(&mut self, source: impl Into<NodeId>, target: impl Into<NodeId>) -> &mut Self {
        self.push_edge(Edge::new(source, target))
    }

    /// Add a predicate-guarded edge
    ///
    /// The predicate must be a pure function of state: no clocks, no
    /// randomness, no side effects. That is what keeps routing
    /// deterministic and resume reproducible.
    pub fn add_conditional_edge(
        &mut self,
        source: impl Into<NodeId>,
        target: impl Into<NodeId>,
        predicate: impl Fn(&State) -> bool + Send + Sync + 'static,
    ) -> &mut Self {
        self.push_edge(Edge::conditional(source, target, predicate))
    }

    /// Add a fully specified edge (label, traversal bound)
    ///
    /// The edge's `order` is assigned by the builder.
    pub fn add_custom_edge(&mut self, edge: Edge) -> &mut Self {
        self.push_edge(edge)
    }

    /// Add an error-designated edge
    ///
    /// Taken when `source` fails permanently (or exhausts its retries)
    /// instead of failing the whole run. One per node.
    pub fn add_error_edge(
        &mut self,
        source: impl Into<NodeId>,
        target: impl Into<NodeId>,
    ) -> &mut Self {
        self.error_edges.insert(source.into(), target.into());
        self
    }

    /// Declare `source`'s outgoing edges as a parallel group joining at
    /// `join`, waiting for all branches
    pub fn add_parallel_group(
        &mut self,
        source: impl Into<NodeId>,
        branches: Vec<NodeId>,
        join: impl Into<NodeId>,
    ) -> &mut Self {
        self.add_parallel_group_with_policy(source, branches, join, JoinPolicy::All)
    }

    /// Declare a parallel group with an explicit join policy
    pub fn add_parallel_group_with_policy(
        &mut self,
        source: impl Into<NodeId>,
        branches: Vec<NodeId>,
        join: impl Into<NodeId>,
        policy: JoinPolicy,
    ) -> &mut Self {
        let source = source.into();
        let edges = branches
            .into_iter()
            .enumerate()
            .map(|(order, target)| {
                let mut edge = Edge::new(source.clone(), target);
                edge.order = order;
                edge
            })
            .collect();
        self.parallel.insert(source, (edges, join.into(), policy));
        self
    }

    /// Declare a bounded loop
    ///
    /// Registers a guarded back-edge `source → body` taken while
    /// `continue_if` holds, capped at `max_iterations` traversals, followed
    /// by the fallback `source → exit`. Whichever bound triggers first ends
    /// the loop — the iteration ceiling guarantees termination even if the
    /// condition never turns false.
    pub fn add_loop(
        &mut self,
        source: impl Into<NodeId>,
        body: impl Into<NodeId>,
        exit: impl Into<NodeId>,
        continue_if: impl Fn(&State) -> bool + Send + Sync + 'static,
        max_iterations: u64,
    ) -> &mut Self {
        let source = source.into();
        self.push_edge(
            Edge::conditional(source.clone(), body, continue_if)
                .with_max_traversals(max_iterations),
        );
        self.push_edge(Edge::new(source, exit))
    }

    /// Choose the entry node
    pub fn set_start(&mut self, node: impl Into<NodeId>) -> &mut Self {
        self.start = Some(node.into());
        self
    }

    /// Replace the execution configuration
    pub fn with_config(&mut self, config: ExecutionConfig) -> &mut Self {
        self.config = config;
        self
    }

    /// Bound the event bus buffer per subscriber
    pub fn with_event_capacity(&mut self, capacity: usize) -> &mut Self {
        self.event_capacity = capacity;
        self
    }

    /// Enable checkpointing through the given store
    ///
    /// The cadence comes from the configuration's checkpoint interval.
    pub fn with_checkpoint_store(&mut self, store: Arc<dyn CheckpointStore>) -> &mut Self {
        self.checkpoint_store = Some(store);
        self
    }

    fn push_edge(&mut self, mut edge: Edge) -> &mut Self {
        let edges = self.first_match.entry(edge.source.clone()).or_default();
        edge.order = edges.len();
        edges.push(edge);
        self
    }

    /// Validate and produce an [`Executor`]
    pub fn build(self) -> Result<Executor> {
        self.validate()?;

        let Self {
            nodes,
            first_match,
            parallel,
            error_edges,
            start,
            config,
            event_capacity,
            checkpoint_store,
            ..
        } = self;

        let mut edges: HashMap<NodeId, EdgeGroup> = first_match
            .into_iter()
            .map(|(source, list)| (source, EdgeGroup::FirstMatch(list)))
            .collect();
        for (source, (branches, join, policy)) in parallel {
            edges.insert(
                source,
                EdgeGroup::Parallel {
                    branches,
                    join,
                    policy,
                },
            );
        }

        let start = start.ok_or_else(|| GraphError::validation("no start node set"))?;
        let graph = Graph {
            nodes,
            edges,
            error_edges,
            start,
        };

        let checkpoints = checkpoint_store
            .map(|store| CheckpointManager::new(store, config.checkpoint_interval));

        Ok(Executor::new(
            graph,
            config,
            EventBus::new(event_capacity),
            checkpoints,
        ))
    }

    fn validate(&self) -> Result<()> {
        if let Some(duplicate) = self.duplicate_nodes.first() {
            return Err(GraphError::validation(format!(
                "node id '{}' registered more than once",
                duplicate
            )));
        }

        let start = self
            .start
            .as_ref()
            .ok_or_else(|| GraphError::validation("no start node set"))?;
        if !self.nodes.contains_key(start) {
            return Err(GraphError::validation(format!(
                "start node '{}' is not registered",
                start
            )));
        }

        for (source, edges) in &self.first_match {
            if !self.nodes.contains_key(source) {
                return Err(GraphError::validation(format!(
                    "edge source '{}' is not registered",
                    source
                )));
            }
            if self.parallel.contains_key(source) {
                return Err(GraphError::validation(format!(
                    "node '{}' has both ordinary edges and a parallel group",
                    source
                )));
            }
            for edge in edges {
                if !self.nodes.contains_key(&edge.target) {
                    return Err(GraphError::validation(format!(
                        "edge target '{}' is not registered",
                        edge.target
                    )));
                }
            }
            // An unguarded, unbounded edge matches every state; anywhere but
            // last it silently shadows the edges after it.
            for edge in &edges[..edges.len() - 1] {
                if edge.is_unconditional() && edge.max_traversals.is_none() {
                    return Err(GraphError::validation(format!(
                        "unconditional edge '{}' -> '{}' must be registered last among '{}' edges",
                        edge.source, edge.target, edge.source
                    )));
                }
            }
        }

        for (source, target) in &self.error_edges {
            if !self.nodes.contains_key(source) {
                return Err(GraphError::validation(format!(
                    "error edge source '{}' is not registered",
                    source
                )));
            }
            if !self.nodes.contains_key(target) {
                return Err(GraphError::validation(format!(
                    "error edge target '{}' is not registered",
                    target
                )));
            }
        }

        for (source, (branches, join, policy)) in &self.parallel {
            if !self.nodes.contains_key(source) {
                return Err(GraphError::validation(format!(
                    "parallel group source '{}' is not registered",
                    source
                )));
            }
            if branches.is_empty() {
                return Err(GraphError::validation(format!(
                    "parallel group at '{}' has no branches",
                    source
                )));
            }
            if !self.nodes.contains_key(join) {
                return Err(GraphError::validation(format!(
                    "join node '{}' is not registered",
                    join
                )));
            }
            if let JoinPolicy::Quorum(n) = policy {
                if *n == 0 || *n > branches.len() {
                    return Err(GraphError::validation(format!(
                        "quorum {} is not satisfiable with {} branches at '{}'",
                        n,
                        branches.len(),
                        source
                    )));
                }
            }
            for edge in branches {
                if !self.nodes.contains_key(&edge.target) {
                    return Err(GraphError::validation(format!(
                        "parallel branch target '{}' is not registered",
                        edge.target
                    )));
                }
                self.check_branch_reaches_no_fork(&edge.target, join)?;
            }
        }

        Ok(())
    }

    /// Walk a branch's reachable nodes up to the join; any parallel group in
    /// there would fork inside a fork, which branch walkers reject
    fn check_branch_reaches_no_fork(&self, branch: &NodeId, join: &NodeId) -> Result<()> {
        let mut visited: HashSet<&NodeId> = HashSet::new();
        let mut stack = vec![branch];

        while let Some(node) = stack.pop() {
            if node == join || !visited.insert(node) {
                continue;
            }
            if self.parallel.contains_key(node) {
                return Err(GraphError::validation(format!(
                    "parallel group at '{}' is reachable inside a parallel branch; nested parallel groups are not supported",
                    node
                )));
            }
            if let Some(edges) = self.first_match.get(node) {
                for edge in edges {
                    stack.push(&edge.target);
                }
            }
            if let Some(handler) = self.error_edges.get(node) {
                stack.push(handler);
            }
        }
        Ok(())
    }
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for GraphBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphBuilder")
            .field("nodes", &self.nodes.len())
            .field("edges", &self.first_match.len())
            .field("parallel_groups", &self.parallel.len())
            .field("start", &self.start)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(id: &str) -> Node {
        Node::from_fn(id, |state| async move { Ok(state) })
    }

    fn two_node_builder() -> GraphBuilder {
        let mut builder = GraphBuilder::new();
        builder
            .add_node(noop("a"))
            .add_node(noop("b"))
            .add_edge("a", "b")
            .set_start("a");
        builder
    }

    #[test]
    fn valid_graph_builds() {
        assert!(two_node_builder().build().is_ok());
    }

    #[test]
    fn missing_start_is_rejected() {
        let mut builder = GraphBuilder::new();
        builder.add_node(noop("a"));
        assert!(matches!(
            builder.build(),
            Err(GraphError::Validation(msg)) if msg.contains("start")
        ));
    }

    #[test]
    fn unregistered_start_is_rejected() {
        let mut builder = GraphBuilder::new();
        builder.add_node(noop("a")).set_start("ghost");
        assert!(builder.build().is_err());
    }

    #[test]
    fn dangling_edge_target_is_rejected() {
        let mut builder = GraphBuilder::new();
        builder.add_node(noop("a")).add_edge("a", "ghost").set_start("a");
        assert!(builder.build().is_err());
    }

    #[test]
    fn duplicate_node_id_is_rejected() {
        let mut builder = GraphBuilder::new();
        builder.add_node(noop("a")).add_node(noop("a")).set_start("a");
        assert!(matches!(
            builder.build(),
            Err(GraphError::Validation(msg)) if msg.contains("more than once")
        ));
    }

    #[test]
    fn early_unconditional_edge_is_rejected() {
        let mut builder = GraphBuilder::new();
        builder
            .add_node(noop("a"))
            .add_node(noop("b"))
            .add_node(noop("c"))
            .add_edge("a", "b")
            .add_conditional_edge("a", "c", |_| true)
            .set_start("a");

        assert!(matches!(
            builder.build(),
            Err(GraphError::Validation(msg)) if msg.contains("registered last")
        ));
    }

    #[test]
    fn bounded_unconditional_edge_may_come_first() {
        // A traversal-bounded unguarded edge stops matching at its ceiling,
        // so it does not permanently shadow later edges.
        let mut builder = GraphBuilder::new();
        builder
            .add_node(noop("a"))
            .add_node(noop("b"))
            .add_node(noop("c"))
            .add_custom_edge(Edge::new("a", "b").with_max_traversals(2))
            .add_edge("a", "c")
            .set_start("a");

        assert!(builder.build().is_ok());
    }

    #[test]
    fn parallel_and_ordinary_edges_conflict() {
        let mut builder = GraphBuilder::new();
        builder
            .add_node(noop("a"))
            .add_node(noop("b"))
            .add_node(noop("j"))
            .add_edge("a", "b")
            .add_parallel_group("a", vec!["b".into()], "j")
            .set_start("a");

        assert!(builder.build().is_err());
    }

    #[test]
    fn unsatisfiable_quorum_is_rejected() {
        let mut builder = GraphBuilder::new();
        builder
            .add_node(noop("a"))
            .add_node(noop("b"))
            .add_node(noop("c"))
            .add_node(noop("j"))
            .add_parallel_group_with_policy(
                "a",
                vec!["b".into(), "c".into()],
                "j",
                JoinPolicy::Quorum(3),
            )
            .set_start("a");

        assert!(builder.build().is_err());
    }

    #[test]
    fn nested_parallel_group_is_rejected() {
        let mut builder = GraphBuilder::new();
        builder
            .add_node(noop("a"))
            .add_node(noop("b"))
            .add_node(noop("inner1"))
            .add_node(noop("inner_join"))
            .add_node(noop("j"))
            .add_parallel_group("a", vec!["b".into()], "j")
            .add_parallel_group("b", vec!["inner1".into()], "inner_join")
            .set_start("a");

        assert!(matches!(
            builder.build(),
            Err(GraphError::Validation(msg)) if msg.contains("nested")
        ));
    }

    #[test]
    fn error_edge_endpoints_must_exist() {
        let mut builder = two_node_builder();
        builder.add_error_edge("a", "ghost");
        assert!(builder.build().is_err());
    }
}
