//! Extensible checkpoint storage trait for custom backend implementations
//!
//! [`CheckpointStore`] is the boundary between the engine core and durable
//! storage. The core calls it after completed steps; implementations decide
//! where the bytes live (memory, filesystem, object store, database). The
//! contract is small on purpose:
//!
//! - [`save`](CheckpointStore::save) — append-or-overwrite-latest; must be
//!   safe for concurrent calls from parallel branches of one execution.
//! - [`load_latest`](CheckpointStore::load_latest) — highest-step checkpoint
//!   for an execution, `None` if the execution was never checkpointed.
//! - [`list`](CheckpointStore::list) — all retained checkpoints, ascending
//!   by step, for inspection and post-mortem tooling.
//! - [`delete`](CheckpointStore::delete) — drop an execution's history once
//!   it has terminated and nothing references it.
//!
//! # Implementing a custom backend
//!
//! ```rust,ignore
//! use flowgraph_checkpoint::{Checkpoint, CheckpointStore, Result};
//! use async_trait::async_trait;
//!
//! struct PostgresStore { pool: sqlx::PgPool }
//!
//! #[async_trait]
//! impl CheckpointStore for PostgresStore {
//!     async fn save(&self, checkpoint: &Checkpoint) -> Result<()> {
//!         // INSERT INTO checkpoints ... ON CONFLICT (execution_id, step) DO UPDATE ...
//!         # unimplemented!()
//!     }
//!     // ...
//! }
//! ```

use crate::checkpoint::Checkpoint;
use crate::error::Result;
use async_trait::async_trait;

/// Storage backend for execution checkpoints
///
/// Implementations must tolerate concurrent `save` calls for the same
/// execution id; the engine guarantees distinct steps within one execution
/// but parallel branches may flush snapshots close together.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Persist a checkpoint, overwriting any existing snapshot at the same
    /// `(execution_id, step)`
    async fn save(&self, checkpoint: &Checkpoint) -> Result<()>;

    /// Load the most recent (highest step) checkpoint for an execution
    async fn load_latest(&self, execution_id: &str) -> Result<Option<Checkpoint>>;

    /// List all retained checkpoints for an execution, ascending by step
    async fn list(&self, execution_id: &str) -> Result<Vec<Checkpoint>>;

    /// Remove all checkpoints for an execution
    async fn delete(&self, execution_id: &str) -> Result<()>;
}
