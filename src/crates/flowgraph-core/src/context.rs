//! Per-run execution bookkeeping
//!
//! An [`ExecutionContext`] tracks one traversal: its id, the ordered path of
//! visited nodes, the step counter, per-edge traversal counts (what bounds
//! loop back-edges), timing, and the cooperative cancellation token. The
//! context is ephemeral — it lives for one run — but its position fields are
//! what checkpoints persist and what resume reconstructs.
//!
//! Invariants: the step counter is strictly increasing and always equals the
//! path length; a node is appended to the path when its execution is
//! *attempted*, so a failing node is still visible in diagnostics.

use crate::edge::{Edge, EdgeKey};
use crate::node::NodeId;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Bookkeeping for one execution
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    /// Unique id of this run
    pub execution_id: Uuid,

    /// Node most recently visited, `None` before the first step
    pub current_node: Option<NodeId>,

    /// Ordered ids of visited nodes; length equals `step`
    pub path: Vec<NodeId>,

    /// Strictly increasing step counter
    pub step: u64,

    /// How often each bounded edge has been taken
    pub edge_counts: HashMap<EdgeKey, u64>,

    /// Run start time
    pub started_at: DateTime<Utc>,

    /// Run end time, set when traversal finishes
    pub finished_at: Option<DateTime<Utc>>,

    /// Cooperative cancellation signal, observed between steps only
    pub cancellation: CancellationToken,
}

impl ExecutionContext {
    /// Fresh context with a new execution id
    pub fn new() -> Self {
        Self {
            execution_id: Uuid::new_v4(),
            current_node: None,
            path: Vec::new(),
            step: 0,
            edge_counts: HashMap::new(),
            started_at: Utc::now(),
            finished_at: None,
            cancellation: CancellationToken::new(),
        }
    }

    /// Attach a cancellation token
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Whether cancellation has been requested
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Record that a node's execution was attempted
    pub fn record_step(&mut self, node: &NodeId) {
        self.step += 1;
        self.path.push(node.clone());
        self.current_node = Some(node.clone());
    }

    /// Record that an edge was taken
    pub fn record_traversal(&mut self, edge: &Edge) {
        *self.edge_counts.entry(edge.key()).or_insert(0) += 1;
    }

    /// How often an edge has been taken so far
    pub fn traversals(&self, edge: &Edge) -> u64 {
        self.edge_counts.get(&edge.key()).copied().unwrap_or(0)
    }

    /// Mark the run finished now
    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// Encode edge counts for checkpoint storage (`"source#order"` keys)
    pub fn encode_edge_counts(&self) -> BTreeMap<String, u64> {
        self.edge_counts
            .iter()
            .map(|((source, order), count)| (format!("{}#{}", source, order), *count))
            .collect()
    }

    /// Restore edge counts from their checkpoint encoding
    ///
    /// Malformed keys are skipped; a checkpoint written by this engine never
    /// produces them.
    pub fn decode_edge_counts(encoded: &BTreeMap<String, u64>) -> HashMap<EdgeKey, u64> {
        encoded
            .iter()
            .filter_map(|(key, count)| {
                let (source, order) = key.rsplit_once('#')?;
                let order: usize = order.parse().ok()?;
                Some(((source.to_string(), order), *count))
            })
            .collect()
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edge::Edge;

    #[test]
    fn path_length_tracks_step_counter() {
        let mut ctx = ExecutionContext::new();
        ctx.record_step(&"a".to_string());
        ctx.record_step(&"b".to_string());

        assert_eq!(ctx.step, 2);
        assert_eq!(ctx.path, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(ctx.current_node.as_deref(), Some("b"));
    }

    #[test]
    fn traversal_counts_accumulate() {
        let mut ctx = ExecutionContext::new();
        let mut edge = Edge::new("loop", "body");
        edge.order = 1;

        assert_eq!(ctx.traversals(&edge), 0);
        ctx.record_traversal(&edge);
        ctx.record_traversal(&edge);
        assert_eq!(ctx.traversals(&edge), 2);
    }

    #[test]
    fn edge_counts_roundtrip_through_encoding() {
        let mut ctx = ExecutionContext::new();
        let mut edge = Edge::new("check", "retry");
        edge.order = 3;
        ctx.record_traversal(&edge);
        ctx.record_traversal(&edge);

        let encoded = ctx.encode_edge_counts();
        assert_eq!(encoded.get("check#3"), Some(&2));

        let decoded = ExecutionContext::decode_edge_counts(&encoded);
        assert_eq!(decoded.get(&("check".to_string(), 3)), Some(&2));
    }

    #[test]
    fn node_ids_with_hash_still_roundtrip() {
        // rsplit_once keeps everything before the last '#' as the source.
        let mut ctx = ExecutionContext::new();
        let mut edge = Edge::new("stage#1", "next");
        edge.order = 0;
        ctx.record_traversal(&edge);

        let decoded = ExecutionContext::decode_edge_counts(&ctx.encode_edge_counts());
        assert_eq!(decoded.get(&("stage#1".to_string(), 0)), Some(&1));
    }

    #[test]
    fn cancellation_is_observable() {
        let token = CancellationToken::new();
        let ctx = ExecutionContext::new().with_cancellation(token.clone());

        assert!(!ctx.is_cancelled());
        token.cancel();
        assert!(ctx.is_cancelled());
    }
}
