//! Subgraph runner - nested executors as single nodes
//!
//! A subgraph wraps a nested [`Executor`] in an ordinary [`Node`], so the
//! parent graph routes through it like any other unit of work. What crosses
//! the boundary is governed by the [`IsolationMode`] and the input/output
//! key maps:
//!
//! - [`IsolationMode::IsolatedClone`] — the child runs on a fresh state
//!   holding deep clones of only the input-mapped keys; nothing else leaks
//!   in, and only output-mapped keys propagate back.
//! - [`IsolationMode::ScopedPrefix`] — the child shares the parent's
//!   entries and is expected to write under the configured prefix; on
//!   return, prefixed keys are demapped into the requested output keys and
//!   every non-prefixed child write is discarded. The input map does not
//!   apply in this mode.
//!
//! Returned keys merge into the parent under the configured
//! [`ConflictPolicy`], exactly as at a parallel join. A child run that does
//! not complete surfaces as a permanent failure of the wrapping node, so
//! parent error edges apply.
//!
//! # Example
//!
//! ```rust,no_run
//! use flowgraph_core::builder::GraphBuilder;
//! use flowgraph_core::subgraph::{subgraph_node, SubgraphConfig};
//! use std::sync::Arc;
//!
//! # fn example(child: flowgraph_core::executor::Executor) -> Result<(), Box<dyn std::error::Error>> {
//! let config = SubgraphConfig::new("scorer")
//!     .map_input("document", "input")
//!     .map_output("score", "document_score");
//!
//! let mut parent = GraphBuilder::new();
//! parent.add_node(subgraph_node("score_document", Arc::new(child), config));
//! # Ok(())
//! # }
//! ```

use crate::executor::Executor;
use crate::node::{Node, NodeError, NodeId};
use crate::state::{ConflictPolicy, State};
use std::sync::Arc;
use tracing::debug;

/// How a nested executor's state relates to its parent's
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IsolationMode {
    /// Child sees only deep clones of the input-mapped keys
    IsolatedClone,

    /// Child shares the parent state and writes under this prefix
    ScopedPrefix(String),
}

/// Configuration for one subgraph node
#[derive(Clone)]
pub struct SubgraphConfig {
    /// Name used in logs and failure messages
    pub name: String,

    /// Isolation mode (default [`IsolationMode::IsolatedClone`])
    pub isolation: IsolationMode,

    /// `(parent key, child key)` pairs copied in (IsolatedClone only)
    pub input_map: Vec<(String, String)>,

    /// `(child key, parent key)` pairs propagated back
    ///
    /// Under `ScopedPrefix`, child keys are matched after the prefix is
    /// stripped; an empty output map demaps every prefixed key to its
    /// stripped name.
    pub output_map: Vec<(String, String)>,

    /// How returned keys merge into the parent
    pub conflict_policy: ConflictPolicy,
}

impl SubgraphConfig {
    /// Default config: isolated clone, empty maps, prefer-incoming merge
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            isolation: IsolationMode::IsolatedClone,
            input_map: Vec::new(),
            output_map: Vec::new(),
            conflict_policy: ConflictPolicy::PreferIncoming,
        }
    }

    /// Choose the isolation mode
    pub fn with_isolation(mut self, isolation: IsolationMode) -> Self {
        self.isolation = isolation;
        self
    }

    /// Copy `parent_key` into the child as `child_key` (IsolatedClone)
    pub fn map_input(
        mut self,
        parent_key: impl Into<String>,
        child_key: impl Into<String>,
    ) -> Self {
        self.input_map.push((parent_key.into(), child_key.into()));
        self
    }

    /// Propagate the child's `child_key` back as `parent_key`
    pub fn map_output(
        mut self,
        child_key: impl Into<String>,
        parent_key: impl Into<String>,
    ) -> Self {
        self.output_map.push((child_key.into(), parent_key.into()));
        self
    }

    /// Choose the merge-back conflict policy
    pub fn with_conflict_policy(mut self, policy: ConflictPolicy) -> Self {
        self.conflict_policy = policy;
        self
    }
}

impl std::fmt::Debug for SubgraphConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubgraphConfig")
            .field("name", &self.name)
            .field("isolation", &self.isolation)
            .field("input_map", &self.input_map)
            .field("output_map", &self.output_map)
            .field("conflict_policy", &self.conflict_policy)
            .finish()
    }
}

/// Wrap a nested executor as a single node
///
/// The returned node can be registered, routed, retried, and error-edged
/// like any other; the parent's executor never looks inside it.
pub fn subgraph_node(
    id: impl Into<NodeId>,
    executor: Arc<Executor>,
    config: SubgraphConfig,
) -> Node {
    let id = id.into();
    let name = format!("subgraph:{}", config.name);

    Node::from_fn(id, move |parent_state: State| {
        let executor = Arc::clone(&executor);
        let config = config.clone();
        async move { run_subgraph(executor, config, parent_state).await }
    })
    .with_name(name)
}

async fn run_subgraph(
    executor: Arc<Executor>,
    config: SubgraphConfig,
    parent_state: State,
) -> Result<State, NodeError> {
    let child_input = match &config.isolation {
        IsolationMode::IsolatedClone => {
            let mut child = State::new();
            for (parent_key, child_key) in &config.input_map {
                if let Some(value) = parent_state.try_get(parent_key) {
                    child.set(child_key.clone(), value.clone());
                }
            }
            child
        }
        IsolationMode::ScopedPrefix(_) => parent_state.clone(),
    };

    debug!(subgraph = %config.name, keys = child_input.len(), "entering subgraph");
    let report = executor
        .invoke(child_input)
        .await
        .map_err(|e| NodeError::permanent(format!("subgraph '{}': {}", config.name, e)))?;

    if !report.is_completed() {
        let detail = report
            .error
            .as_ref()
            .map(|e| e.to_string())
            .unwrap_or_else(|| format!("{:?}", report.status));
        return Err(NodeError::permanent(format!(
            "subgraph '{}' did not complete: {}",
            config.name, detail
        )));
    }

    let mut returned = State::new();
    match &config.isolation {
        IsolationMode::IsolatedClone => {
            for (child_key, parent_key) in &config.output_map {
                if let Some(value) = report.state.try_get(child_key) {
                    returned.set(parent_key.clone(), value.clone());
                }
            }
        }
        IsolationMode::ScopedPrefix(prefix) => {
            for (key, value) in report.state.entries() {
                let stripped = match key.strip_prefix(prefix.as_str()) {
                    Some(stripped) => stripped,
                    // Non-prefixed child writes stay inside the child.
                    None => continue,
                };
                let parent_key = if config.output_map.is_empty() {
                    Some(stripped.to_string())
                } else {
                    config
                        .output_map
                        .iter()
                        .find(|(child_key, _)| child_key == stripped)
                        .map(|(_, parent_key)| parent_key.clone())
                };
                if let Some(parent_key) = parent_key {
                    returned.set(parent_key, value.clone());
                }
            }
        }
    }

    let mut merged = parent_state;
    merged.merge(&returned, config.conflict_policy);
    debug!(subgraph = %config.name, returned = returned.len(), "subgraph merged back");
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::GraphBuilder;
    use serde_json::json;

    fn child_executor() -> Arc<Executor> {
        let mut builder = GraphBuilder::new();
        builder
            .add_node(Node::from_fn("work", |mut state: State| async move {
                let input = state.get_i64("input").unwrap_or(0);
                state.set("score", json!(input * 10));
                state.set("scratch", json!("internal"));
                Ok(state)
            }))
            .set_start("work");
        Arc::new(builder.build().unwrap())
    }

    #[tokio::test]
    async fn isolated_clone_maps_input_and_output() {
        let config = SubgraphConfig::new("scorer")
            .map_input("document", "input")
            .map_output("score", "document_score");
        let node = subgraph_node("score", child_executor(), config);

        let parent = State::with_entries([
            ("document", json!(7)),
            ("secret", json!("stays out")),
        ]);
        let result = (node.executor)(parent).await.unwrap();

        assert_eq!(result.get_i64("document_score").unwrap(), 70);
        // The child's scratch key never reaches the parent.
        assert!(result.try_get("scratch").is_none());
        // Untouched parent keys survive.
        assert_eq!(result.get_str("secret").unwrap(), "stays out");
    }

    #[tokio::test]
    async fn isolated_clone_hides_unmapped_parent_keys() {
        let observed = Arc::new(std::sync::Mutex::new(None));
        let observed_clone = Arc::clone(&observed);

        let mut builder = GraphBuilder::new();
        builder
            .add_node(Node::from_fn("peek", move |state: State| {
                let observed = Arc::clone(&observed_clone);
                async move {
                    *observed.lock().unwrap() = Some(state.contains_key("secret"));
                    Ok(state)
                }
            }))
            .set_start("peek");
        let child = Arc::new(builder.build().unwrap());

        let node = subgraph_node("isolated", child, SubgraphConfig::new("peeker"));
        let parent = State::with_entries([("secret", json!("hidden"))]);
        (node.executor)(parent).await.unwrap();

        assert_eq!(*observed.lock().unwrap(), Some(false));
    }

    #[tokio::test]
    async fn scoped_prefix_demaps_prefixed_writes() {
        let mut builder = GraphBuilder::new();
        builder
            .add_node(Node::from_fn("annotate", |mut state: State| async move {
                state.set("review.verdict", json!("approved"));
                state.set("leak_attempt", json!(true));
                Ok(state)
            }))
            .set_start("annotate");
        let child = Arc::new(builder.build().unwrap());

        let config = SubgraphConfig::new("reviewer")
            .with_isolation(IsolationMode::ScopedPrefix("review.".to_string()))
            .map_output("verdict", "review_verdict");
        let node = subgraph_node("review", child, config);

        let parent = State::with_entries([("document", json!("text"))]);
        let result = (node.executor)(parent).await.unwrap();

        assert_eq!(result.get_str("review_verdict").unwrap(), "approved");
        // Writes outside the prefix are discarded at the boundary.
        assert!(result.try_get("leak_attempt").is_none());
        assert_eq!(result.get_str("document").unwrap(), "text");
    }

    #[tokio::test]
    async fn scoped_prefix_without_output_map_demaps_all() {
        let mut builder = GraphBuilder::new();
        builder
            .add_node(Node::from_fn("annotate", |mut state: State| async move {
                state.set("sub.a", json!(1));
                state.set("sub.b", json!(2));
                Ok(state)
            }))
            .set_start("annotate");
        let child = Arc::new(builder.build().unwrap());

        let config = SubgraphConfig::new("all")
            .with_isolation(IsolationMode::ScopedPrefix("sub.".to_string()));
        let node = subgraph_node("sub", child, config);

        let result = (node.executor)(State::new()).await.unwrap();
        assert_eq!(result.get_i64("a").unwrap(), 1);
        assert_eq!(result.get_i64("b").unwrap(), 2);
    }

    #[tokio::test]
    async fn failed_child_surfaces_as_permanent_failure() {
        let mut builder = GraphBuilder::new();
        builder
            .add_node(Node::from_fn("explode", |_state: State| async move {
                Err(NodeError::permanent("boom"))
            }))
            .set_start("explode");
        let child = Arc::new(builder.build().unwrap());

        let node = subgraph_node("failing", child, SubgraphConfig::new("failing"));
        let err = (node.executor)(State::new()).await.unwrap_err();

        assert_eq!(err.kind, crate::node::FailureKind::Permanent);
        assert!(err.message.contains("did not complete"));
    }
}
