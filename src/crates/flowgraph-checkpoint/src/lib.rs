//! # flowgraph-checkpoint - Durable execution snapshots
//!
//! Checkpoint abstractions for the flowgraph execution engine: the
//! [`Checkpoint`] snapshot record, the pluggable [`CheckpointStore`] trait,
//! and two reference backends ([`InMemoryCheckpointStore`],
//! [`FileCheckpointStore`]).
//!
//! The engine core snapshots an execution's position (current node, path,
//! step, loop-edge counts) plus a serialized copy of its state at a
//! configurable cadence. A store persists those snapshots; a resume operation
//! loads the latest one and hands traversal back to the executor. Nothing in
//! this crate knows what a node *does* — state payloads are opaque JSON.
//!
//! ## Quick start
//!
//! ```rust
//! use flowgraph_checkpoint::{Checkpoint, CheckpointStore, InMemoryCheckpointStore};
//! use serde_json::json;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = InMemoryCheckpointStore::new();
//!
//! store
//!     .save(&Checkpoint::new(
//!         "exec-1",
//!         1,
//!         "fetch",
//!         vec!["fetch".into()],
//!         json!({"records": 42}),
//!     ))
//!     .await?;
//!
//! let latest = store.load_latest("exec-1").await?.unwrap();
//! assert_eq!(latest.current_node, "fetch");
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`checkpoint`] - The [`Checkpoint`] snapshot record
//! - [`traits`] - The [`CheckpointStore`] backend trait
//! - [`memory`] - In-memory reference backend
//! - [`fs`] - Filesystem backend (one file per snapshot)
//! - [`serializer`] - Wire-format selection (JSON, bincode)
//! - [`error`] - [`CheckpointError`] and the crate [`Result`] alias

pub mod checkpoint;
pub mod error;
pub mod fs;
pub mod memory;
pub mod serializer;
pub mod traits;

pub use checkpoint::Checkpoint;
pub use error::{CheckpointError, Result};
pub use fs::FileCheckpointStore;
pub use memory::InMemoryCheckpointStore;
pub use serializer::{BincodeSerializer, JsonSerializer, SerializerProtocol};
pub use traits::CheckpointStore;
