//! Checkpoint data structures for execution snapshots
//!
//! A [`Checkpoint`] is a durable record of one execution's position and state
//! at a step boundary: which node just completed, the path walked so far, the
//! per-edge traversal counts (needed to resume bounded loops correctly), and
//! an opaque serialized state payload. The engine core decides *when* to
//! snapshot; this crate only defines *what* a snapshot is and where it goes.
//!
//! Checkpoints are identified by `(execution_id, step)`; within one execution
//! the step counter is strictly increasing, so "latest" is well defined.
//!
//! # Example
//!
//! ```rust
//! use flowgraph_checkpoint::Checkpoint;
//! use serde_json::json;
//!
//! let checkpoint = Checkpoint::new(
//!     "exec-1",
//!     3,
//!     "validate",
//!     vec!["fetch".into(), "parse".into(), "validate".into()],
//!     json!({"entries": {"records": 42}}),
//! );
//!
//! assert_eq!(checkpoint.step, 3);
//! assert_eq!(checkpoint.current_node, "validate");
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// A durable snapshot of one execution's position and state
///
/// The `state` payload is an opaque JSON value produced by the engine core
/// (a serialized state snapshot); stores never look inside it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Checkpoint {
    /// Execution this snapshot belongs to
    pub execution_id: String,

    /// Unique id of this snapshot
    pub checkpoint_id: Uuid,

    /// Step counter at snapshot time (number of completed nodes)
    pub step: u64,

    /// Node that had just completed when the snapshot was taken
    pub current_node: String,

    /// Ordered list of visited node ids, length equal to `step`
    pub path: Vec<String>,

    /// Traversal counts for bounded edges, keyed `"<source>#<edge index>"`
    ///
    /// Required so that resumed executions honour loop iteration ceilings
    /// instead of restarting them from zero.
    #[serde(default)]
    pub edge_counts: BTreeMap<String, u64>,

    /// Serialized state snapshot, opaque to the store
    pub state: serde_json::Value,

    /// Snapshot creation time
    pub created_at: DateTime<Utc>,
}

impl Checkpoint {
    /// Create a checkpoint for the given position
    pub fn new(
        execution_id: impl Into<String>,
        step: u64,
        current_node: impl Into<String>,
        path: Vec<String>,
        state: serde_json::Value,
    ) -> Self {
        Self {
            execution_id: execution_id.into(),
            checkpoint_id: Uuid::new_v4(),
            step,
            current_node: current_node.into(),
            path,
            edge_counts: BTreeMap::new(),
            state,
            created_at: Utc::now(),
        }
    }

    /// Attach per-edge traversal counts
    pub fn with_edge_counts(mut self, edge_counts: BTreeMap<String, u64>) -> Self {
        self.edge_counts = edge_counts;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn checkpoint_roundtrips_through_json() {
        let checkpoint = Checkpoint::new(
            "exec-1",
            2,
            "b",
            vec!["a".into(), "b".into()],
            json!({"k": 1}),
        )
        .with_edge_counts(BTreeMap::from([("a#0".to_string(), 1)]));

        let bytes = serde_json::to_vec(&checkpoint).unwrap();
        let restored: Checkpoint = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(checkpoint, restored);
    }

    #[test]
    fn path_length_matches_step() {
        let checkpoint = Checkpoint::new(
            "exec-1",
            3,
            "c",
            vec!["a".into(), "b".into(), "c".into()],
            json!({}),
        );
        assert_eq!(checkpoint.path.len() as u64, checkpoint.step);
    }
}
