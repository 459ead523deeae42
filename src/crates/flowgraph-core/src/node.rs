//! Node abstraction - the unit of work executed against state
//!
//! A [`Node`] is an addressable unit of work: an id, an async executor
//! (`State -> Result<State, NodeError>`), and optional per-node behaviour
//! (timeout, retry policy, lifecycle hooks). The executor owns what the node
//! *does*; the engine only cares that it takes state in and hands state (or a
//! typed failure) back.
//!
//! Node executors must be reentrant: a node instance can be shared by
//! concurrent executions, so all mutable data belongs in the state container,
//! never in the closure. A node must also not assume anything about what ran
//! before it beyond its documented state keys.
//!
//! # Failure semantics
//!
//! A node fails with one of three [`FailureKind`]s, and the executor reacts
//! per kind: `Transient` failures are retried under the node's (or default)
//! retry policy; `Permanent` and `Validation` failures are routed along an
//! error edge when one exists and otherwise fail the run. `Validation` is
//! never retried.
//!
//! # Example
//!
//! ```rust
//! use flowgraph_core::node::{Node, NodeError};
//! use serde_json::json;
//!
//! let fetch = Node::from_fn("fetch", |mut state| async move {
//!     state.set("records", json!([1, 2, 3]));
//!     Ok(state)
//! })
//! .with_description("Load records from upstream");
//!
//! assert_eq!(fetch.id, "fetch");
//! ```

use crate::retry::RetryPolicy;
use crate::state::State;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Node identifier - unique within one executor instance
pub type NodeId = String;

/// Outcome of one node execution
pub type NodeResult = std::result::Result<State, NodeError>;

/// Async executor function carried by a node
pub type NodeExecutor = Arc<dyn Fn(State) -> BoxFuture<'static, NodeResult> + Send + Sync>;

/// Lifecycle observer invoked immediately before or after the node body
pub type NodeHook = Arc<dyn Fn(&State) + Send + Sync>;

/// Classification of a node failure, driving the executor's reaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Retryable: the same call may succeed later (timeouts, rate limits)
    Transient,

    /// Not retryable: repeating the call cannot help
    Permanent,

    /// The node's input/state contract was violated; never retried
    Validation,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::Transient => write!(f, "transient"),
            FailureKind::Permanent => write!(f, "permanent"),
            FailureKind::Validation => write!(f, "validation"),
        }
    }
}

/// A typed node failure
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{kind} failure: {message}")]
pub struct NodeError {
    /// How the executor should react
    pub kind: FailureKind,
    /// Human-readable description
    pub message: String,
}

impl NodeError {
    /// A retryable failure
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Transient,
            message: message.into(),
        }
    }

    /// A non-retryable failure
    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Permanent,
            message: message.into(),
        }
    }

    /// A state/input contract violation
    pub fn validation(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Validation,
            message: message.into(),
        }
    }

    /// Whether the executor may retry this failure
    pub fn is_retryable(&self) -> bool {
        self.kind == FailureKind::Transient
    }
}

/// How a fired per-node timeout is classified
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeoutBehavior {
    /// Timeout becomes a `Transient` failure (default; retried if allowed)
    #[default]
    Transient,
    /// Timeout becomes a `Permanent` failure
    Permanent,
}

/// An addressable unit of work in the graph
///
/// Identity is immutable once the node is registered into a builder. Hooks
/// are synchronous observers: `before` sees the state entering the body,
/// `after` sees the state a successful body produced. A failed body skips the
/// `after` hook.
#[derive(Clone)]
pub struct Node {
    /// Unique id within one executor
    pub id: NodeId,

    /// Human-readable name (defaults to the id)
    pub name: String,

    /// Optional longer description
    pub description: Option<String>,

    /// The async work function
    pub executor: NodeExecutor,

    /// Per-node execution timeout; falls back to the executor's default
    pub timeout: Option<Duration>,

    /// Failure kind a fired timeout converts to
    pub on_timeout: TimeoutBehavior,

    /// Per-node retry policy for transient failures; falls back to the
    /// executor's default
    pub retry: Option<RetryPolicy>,

    /// Observer run immediately before the body
    pub before: Option<NodeHook>,

    /// Observer run immediately after a successful body
    pub after: Option<NodeHook>,

    /// Free-form metadata
    pub metadata: BTreeMap<String, String>,
}

impl Node {
    /// Create a node from a prepared executor
    pub fn new(id: impl Into<NodeId>, executor: NodeExecutor) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            description: None,
            executor,
            timeout: None,
            on_timeout: TimeoutBehavior::default(),
            retry: None,
            before: None,
            after: None,
            metadata: BTreeMap::new(),
        }
    }

    /// Create a node from an async closure
    ///
    /// ```rust
    /// use flowgraph_core::node::Node;
    /// use serde_json::json;
    ///
    /// let node = Node::from_fn("double", |mut state| async move {
    ///     let n = state.get_i64("n").unwrap_or(0);
    ///     state.set("n", json!(n * 2));
    ///     Ok(state)
    /// });
    /// ```
    pub fn from_fn<F, Fut>(id: impl Into<NodeId>, f: F) -> Self
    where
        F: Fn(State) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = NodeResult> + Send + 'static,
    {
        Self::new(id, Arc::new(move |state| Box::pin(f(state))))
    }

    /// Set a human-readable name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set a description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Bound the body's wall-clock duration
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Choose how a fired timeout is classified
    pub fn with_timeout_behavior(mut self, behavior: TimeoutBehavior) -> Self {
        self.on_timeout = behavior;
        self
    }

    /// Set a per-node retry policy for transient failures
    pub fn with_retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }

    /// Install a pre-execution observer
    pub fn with_before_hook(mut self, hook: impl Fn(&State) + Send + Sync + 'static) -> Self {
        self.before = Some(Arc::new(hook));
        self
    }

    /// Install a post-execution observer (successful bodies only)
    pub fn with_after_hook(mut self, hook: impl Fn(&State) + Send + Sync + 'static) -> Self {
        self.after = Some(Arc::new(hook));
        self
    }

    /// Attach a metadata entry
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("description", &self.description)
            .field("executor", &"<fn>")
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .field("before", &self.before.as_ref().map(|_| "<hook>"))
            .field("after", &self.after.as_ref().map(|_| "<hook>"))
            .field("metadata", &self.metadata)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn from_fn_executes_body() {
        let node = Node::from_fn("inc", |mut state: State| async move {
            let n = state.get_i64("n").unwrap_or(0);
            state.set("n", json!(n + 1));
            Ok(state)
        });

        let state = State::with_entries([("n", json!(41))]);
        let result = (node.executor)(state).await.unwrap();
        assert_eq!(result.get_i64("n").unwrap(), 42);
    }

    #[test]
    fn builders_compose() {
        let node = Node::from_fn("n", |state| async move { Ok(state) })
            .with_name("Renamed")
            .with_description("desc")
            .with_timeout(Duration::from_secs(5))
            .with_metadata("team", "core");

        assert_eq!(node.id, "n");
        assert_eq!(node.name, "Renamed");
        assert_eq!(node.timeout, Some(Duration::from_secs(5)));
        assert_eq!(node.metadata.get("team").map(|s| s.as_str()), Some("core"));
    }

    #[test]
    fn failure_kinds_classify_retryability() {
        assert!(NodeError::transient("x").is_retryable());
        assert!(!NodeError::permanent("x").is_retryable());
        assert!(!NodeError::validation("x").is_retryable());
    }

    #[test]
    fn node_error_displays_kind() {
        let err = NodeError::validation("missing field 'user'");
        assert_eq!(err.to_string(), "validation failure: missing field 'user'");
    }
}
