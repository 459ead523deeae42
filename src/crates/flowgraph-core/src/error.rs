//! Error types for graph construction and execution
//!
//! Failures *inside* a run (node errors, runaway loops) are reported through
//! the structured [`ExecutionReport`](crate::executor::ExecutionReport), not
//! through this enum — callers never see a bare error escape the engine for
//! anything the traversal itself can describe. `GraphError` covers what
//! happens around a run: invalid graph structure, checkpoint storage
//! failures, serialization problems.

use thiserror::Error;

/// Convenience result type using [`GraphError`]
pub type Result<T> = std::result::Result<T, GraphError>;

/// Errors raised by graph construction, compilation, and run plumbing
#[derive(Error, Debug)]
pub enum GraphError {
    /// Graph structure validation failed at build time
    ///
    /// Raised by [`GraphBuilder::build`](crate::builder::GraphBuilder::build)
    /// for missing nodes, dangling edge endpoints, misordered unconditional
    /// edges, or malformed parallel groups.
    #[error("Graph validation failed: {0}")]
    Validation(String),

    /// A run could not be started or resumed
    #[error("Execution error: {0}")]
    Execution(String),

    /// Edge or node referenced an id that is not registered
    #[error("Unknown node '{0}'")]
    UnknownNode(String),

    /// Checkpoint persistence failed
    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] flowgraph_checkpoint::CheckpointError),

    /// State snapshot (de)serialization failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl GraphError {
    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create an execution plumbing error
    pub fn execution(message: impl Into<String>) -> Self {
        Self::Execution(message.into())
    }
}
