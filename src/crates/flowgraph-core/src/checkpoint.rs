//! Checkpoint manager - interval snapshots and resume
//!
//! The [`CheckpointManager`] sits between the executor and a
//! [`CheckpointStore`]: after every completed step the executor calls
//! [`maybe_checkpoint`](CheckpointManager::maybe_checkpoint), which persists
//! a snapshot when the step counter hits the configured interval;
//! [`force_checkpoint`](CheckpointManager::force_checkpoint) persists one
//! unconditionally (used on failure for post-mortem resume-and-patch).
//!
//! [`resume`](CheckpointManager::resume) reverses the process: it loads the
//! most recent checkpoint for an execution id and reconstructs the
//! [`ExecutionContext`] (position, path, step, loop-edge counts) and
//! [`State`] so the executor can continue traversal from the recorded node.
//! Resume is idempotent at the engine level: the same checkpoint always
//! reconstructs the same position, and routing from it is deterministic.
//! Nodes with external side effects must be written idempotently for the
//! full guarantee — that contract belongs to node authors, the engine cannot
//! enforce it.

use crate::context::ExecutionContext;
use crate::error::{GraphError, Result};
use crate::state::{State, StateSnapshot};
use flowgraph_checkpoint::{Checkpoint, CheckpointError, CheckpointStore};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// Interval-based checkpointing over a pluggable store
#[derive(Clone)]
pub struct CheckpointManager {
    store: Arc<dyn CheckpointStore>,
    interval: u64,
}

impl CheckpointManager {
    /// Create a manager snapshotting every `interval` completed steps
    ///
    /// An interval of 0 disables interval snapshots; forced checkpoints
    /// still work.
    pub fn new(store: Arc<dyn CheckpointStore>, interval: u64) -> Self {
        Self { store, interval }
    }

    /// Configured snapshot cadence in steps
    pub fn interval(&self) -> u64 {
        self.interval
    }

    /// The underlying store
    pub fn store(&self) -> &Arc<dyn CheckpointStore> {
        &self.store
    }

    /// Persist a snapshot when the step counter is on the interval
    ///
    /// Returns the checkpoint id when one was written, `None` when this step
    /// is off-cadence.
    pub async fn maybe_checkpoint(
        &self,
        ctx: &ExecutionContext,
        state: &State,
    ) -> Result<Option<Uuid>> {
        if self.interval == 0 || ctx.step == 0 || ctx.step % self.interval != 0 {
            return Ok(None);
        }
        self.write(ctx, state).await.map(Some)
    }

    /// Persist a snapshot regardless of cadence
    pub async fn force_checkpoint(&self, ctx: &ExecutionContext, state: &State) -> Result<Uuid> {
        self.write(ctx, state).await
    }

    async fn write(&self, ctx: &ExecutionContext, state: &State) -> Result<Uuid> {
        let current = ctx
            .current_node
            .clone()
            .ok_or_else(|| GraphError::execution("cannot checkpoint before the first step"))?;

        let snapshot = serde_json::to_value(state.snapshot())?;
        let checkpoint = Checkpoint::new(
            ctx.execution_id.to_string(),
            ctx.step,
            current,
            ctx.path.clone(),
            snapshot,
        )
        .with_edge_counts(ctx.encode_edge_counts());

        let checkpoint_id = checkpoint.checkpoint_id;
        self.store.save(&checkpoint).await?;
        debug!(
            execution_id = %ctx.execution_id,
            step = ctx.step,
            checkpoint_id = %checkpoint_id,
            "checkpoint saved"
        );
        Ok(checkpoint_id)
    }

    /// Reconstruct position and state from the most recent checkpoint
    pub async fn resume(&self, execution_id: Uuid) -> Result<(ExecutionContext, State)> {
        let checkpoint = self
            .store
            .load_latest(&execution_id.to_string())
            .await?
            .ok_or_else(|| {
                GraphError::Checkpoint(CheckpointError::NotFound(execution_id.to_string()))
            })?;

        let snapshot: StateSnapshot = serde_json::from_value(checkpoint.state.clone())?;

        let mut ctx = ExecutionContext::new();
        ctx.execution_id = execution_id;
        ctx.current_node = Some(checkpoint.current_node.clone());
        ctx.path = checkpoint.path.clone();
        ctx.step = checkpoint.step;
        ctx.edge_counts = ExecutionContext::decode_edge_counts(&checkpoint.edge_counts);

        info!(
            execution_id = %execution_id,
            step = ctx.step,
            node = %checkpoint.current_node,
            "checkpoint loaded"
        );
        Ok((ctx, snapshot.restore()))
    }
}

impl std::fmt::Debug for CheckpointManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckpointManager")
            .field("interval", &self.interval)
            .finish()
    }
}
