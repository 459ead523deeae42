//! In-memory checkpoint storage
//!
//! Reference [`CheckpointStore`] implementation backed by a `tokio` RwLock.
//! Suitable for tests, development, and executions whose recovery story does
//! not need to survive the process. For durable storage use
//! [`FileCheckpointStore`](crate::FileCheckpointStore) or implement the trait
//! against your own backend.

use crate::checkpoint::Checkpoint;
use crate::error::Result;
use crate::traits::CheckpointStore;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

type Storage = Arc<RwLock<HashMap<String, Vec<Checkpoint>>>>;

/// Thread-safe in-memory checkpoint store
///
/// Checkpoints are kept per execution id, ordered by step. An optional
/// retention bound caps how many snapshots are kept per execution; when the
/// bound is hit the oldest snapshot is discarded first.
///
/// # Example
///
/// ```rust
/// use flowgraph_checkpoint::{Checkpoint, CheckpointStore, InMemoryCheckpointStore};
/// use serde_json::json;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let store = InMemoryCheckpointStore::new();
/// let checkpoint = Checkpoint::new("exec-1", 1, "a", vec!["a".into()], json!({}));
///
/// store.save(&checkpoint).await?;
/// let latest = store.load_latest("exec-1").await?.unwrap();
/// assert_eq!(latest.step, 1);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct InMemoryCheckpointStore {
    storage: Storage,
    max_retained: Option<usize>,
}

impl InMemoryCheckpointStore {
    /// Create a store with unbounded retention
    pub fn new() -> Self {
        Self {
            storage: Arc::new(RwLock::new(HashMap::new())),
            max_retained: None,
        }
    }

    /// Cap the number of checkpoints retained per execution
    pub fn with_max_retained(mut self, max: usize) -> Self {
        self.max_retained = Some(max.max(1));
        self
    }

    /// Number of executions with at least one checkpoint
    pub async fn execution_count(&self) -> usize {
        self.storage.read().await.len()
    }

    /// Total number of retained checkpoints across all executions
    pub async fn checkpoint_count(&self) -> usize {
        self.storage
            .read()
            .await
            .values()
            .map(|entries| entries.len())
            .sum()
    }

    /// Drop everything (useful for tests)
    pub async fn clear(&self) {
        self.storage.write().await.clear();
    }
}

impl Default for InMemoryCheckpointStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CheckpointStore for InMemoryCheckpointStore {
    async fn save(&self, checkpoint: &Checkpoint) -> Result<()> {
        let mut storage = self.storage.write().await;
        let entries = storage
            .entry(checkpoint.execution_id.clone())
            .or_insert_with(Vec::new);

        // Overwrite-latest: a second snapshot at the same step replaces the
        // first instead of duplicating it.
        match entries.iter().position(|c| c.step == checkpoint.step) {
            Some(idx) => entries[idx] = checkpoint.clone(),
            None => {
                entries.push(checkpoint.clone());
                entries.sort_by_key(|c| c.step);
            }
        }

        if let Some(max) = self.max_retained {
            while entries.len() > max {
                entries.remove(0);
            }
        }

        Ok(())
    }

    async fn load_latest(&self, execution_id: &str) -> Result<Option<Checkpoint>> {
        let storage = self.storage.read().await;
        Ok(storage
            .get(execution_id)
            .and_then(|entries| entries.last())
            .cloned())
    }

    async fn list(&self, execution_id: &str) -> Result<Vec<Checkpoint>> {
        let storage = self.storage.read().await;
        Ok(storage.get(execution_id).cloned().unwrap_or_default())
    }

    async fn delete(&self, execution_id: &str) -> Result<()> {
        self.storage.write().await.remove(execution_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn checkpoint(step: u64) -> Checkpoint {
        let path: Vec<String> = (0..step).map(|i| format!("n{}", i)).collect();
        let node = path.last().cloned().unwrap_or_else(|| "start".to_string());
        Checkpoint::new("exec-1", step, node, path, json!({"step": step}))
    }

    #[tokio::test]
    async fn load_latest_returns_highest_step() {
        let store = InMemoryCheckpointStore::new();
        store.save(&checkpoint(1)).await.unwrap();
        store.save(&checkpoint(3)).await.unwrap();
        store.save(&checkpoint(2)).await.unwrap();

        let latest = store.load_latest("exec-1").await.unwrap().unwrap();
        assert_eq!(latest.step, 3);
    }

    #[tokio::test]
    async fn load_latest_missing_execution_is_none() {
        let store = InMemoryCheckpointStore::new();
        assert!(store.load_latest("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn save_overwrites_same_step() {
        let store = InMemoryCheckpointStore::new();
        store.save(&checkpoint(1)).await.unwrap();

        let mut replacement = checkpoint(1);
        replacement.state = json!({"replaced": true});
        store.save(&replacement).await.unwrap();

        assert_eq!(store.checkpoint_count().await, 1);
        let latest = store.load_latest("exec-1").await.unwrap().unwrap();
        assert_eq!(latest.state, json!({"replaced": true}));
    }

    #[tokio::test]
    async fn list_is_ascending_by_step() {
        let store = InMemoryCheckpointStore::new();
        for step in [4, 1, 3, 2] {
            store.save(&checkpoint(step)).await.unwrap();
        }

        let steps: Vec<u64> = store
            .list("exec-1")
            .await
            .unwrap()
            .iter()
            .map(|c| c.step)
            .collect();
        assert_eq!(steps, vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn retention_drops_oldest() {
        let store = InMemoryCheckpointStore::new().with_max_retained(2);
        for step in 1..=4 {
            store.save(&checkpoint(step)).await.unwrap();
        }

        let steps: Vec<u64> = store
            .list("exec-1")
            .await
            .unwrap()
            .iter()
            .map(|c| c.step)
            .collect();
        assert_eq!(steps, vec![3, 4]);
    }

    #[tokio::test]
    async fn delete_removes_execution() {
        let store = InMemoryCheckpointStore::new();
        store.save(&checkpoint(1)).await.unwrap();
        store.delete("exec-1").await.unwrap();

        assert_eq!(store.execution_count().await, 0);
        assert!(store.load_latest("exec-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn concurrent_saves_are_all_retained() {
        let store = InMemoryCheckpointStore::new();
        let mut handles = Vec::new();
        for step in 1..=8u64 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.save(&checkpoint(step)).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.checkpoint_count().await, 8);
        assert_eq!(
            store.load_latest("exec-1").await.unwrap().unwrap().step,
            8
        );
    }
}
