//! # flowgraph-core - Graph workflow execution engine
//!
//! A runtime that walks a directed graph of work units ("nodes") connected by
//! conditional transitions ("edges"), threading a shared mutable state
//! container through each step, and producing a structured result plus a full
//! execution trace.
//!
//! The engine guarantees:
//!
//! - **Deterministic routing** - edges are evaluated first-match in
//!   registration order against pure predicates over state.
//! - **Bounded termination** - every run is capped by a step limit, and loop
//!   back-edges carry their own traversal ceilings.
//! - **Safe parallelism** - parallel branches run on isolated state clones
//!   and merge at the join under an explicit conflict policy; no locks in
//!   node bodies.
//! - **Crash-consistent recovery** - interval checkpoints capture position
//!   and state; `resume` continues a run from its latest snapshot.
//! - **Observable execution** - typed lifecycle events stream to subscribers
//!   over a bounded bus with explicit drop markers.
//!
//! What a node actually *does* is the host application's business: the engine
//! only sees `State -> Result<State, NodeError>`.
//!
//! ## Quick start
//!
//! ```rust
//! use flowgraph_core::{GraphBuilder, Node, State};
//! use serde_json::json;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut builder = GraphBuilder::new();
//! builder
//!     .add_node(Node::from_fn("classify", |mut state| async move {
//!         state.set("age", json!(17));
//!         Ok(state)
//!     }))
//!     .add_node(Node::from_fn("adult", |state| async move { Ok(state) }))
//!     .add_node(Node::from_fn("minor", |state| async move { Ok(state) }))
//!     .add_conditional_edge("classify", "adult", |s: &State| {
//!         s.get_i64("age").map(|age| age >= 18).unwrap_or(false)
//!     })
//!     .add_edge("classify", "minor")
//!     .set_start("classify");
//!
//! let executor = builder.build()?;
//! let report = executor.invoke(State::new()).await?;
//!
//! assert!(report.is_completed());
//! assert_eq!(report.path, vec!["classify".to_string(), "minor".to_string()]);
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! ### Core APIs
//! - [`builder`] - [`GraphBuilder`] construction surface and validation
//! - [`executor`] - [`Executor`] traversal loop, [`ExecutionReport`]
//! - [`graph`] - Compiled graph structure
//!
//! ### State & routing
//! - [`state`] - [`State`] container, snapshots, conflict-policy merging
//! - [`node`] - [`Node`] unit of work and failure taxonomy
//! - [`edge`] - Guarded edges, parallel groups, the first-match [`Router`](edge::Router)
//!
//! ### Execution control
//! - [`context`] - Per-run bookkeeping
//! - [`retry`] - Exponential backoff for transient failures
//! - [`checkpoint`] - [`CheckpointManager`] interval snapshots and resume
//! - [`events`] - Lifecycle events and the bounded [`EventBus`]
//! - [`subgraph`] - Nested executors as single nodes, with isolation
//!
//! ## See also
//!
//! - [`flowgraph_checkpoint`] - The [`CheckpointStore`] trait and reference
//!   backends

pub mod builder;
pub mod checkpoint;
pub mod context;
pub mod edge;
pub mod error;
pub mod events;
pub mod executor;
pub mod graph;
pub mod node;
pub mod retry;
pub mod state;
pub mod subgraph;

pub use builder::GraphBuilder;
pub use checkpoint::CheckpointManager;
pub use context::ExecutionContext;
pub use edge::{Edge, EdgeGroup, EdgeKey, JoinPolicy, Route};
pub use error::{GraphError, Result};
pub use events::{EventBus, EventFilter, EventKind, EventStream, EventTag, ExecutionEvent};
pub use executor::{
    ExecutionConfig, ExecutionError, ExecutionReport, ExecutionStatus, Executor,
};
pub use graph::Graph;
pub use node::{FailureKind, Node, NodeError, NodeId, NodeResult, TimeoutBehavior};
pub use retry::{RetryPolicy, RetryState};
pub use state::{ConflictPolicy, State, StateError, StateSnapshot};
pub use subgraph::{subgraph_node, IsolationMode, SubgraphConfig};

// Checkpoint storage surface re-exported for convenience
pub use flowgraph_checkpoint::{
    Checkpoint, CheckpointError, CheckpointStore, FileCheckpointStore, InMemoryCheckpointStore,
};
