//! Filesystem-backed checkpoint storage
//!
//! [`FileCheckpointStore`] persists one file per checkpoint under
//! `<root>/<execution_id>/step_<NNNNNNNN>.<ext>`. The zero-padded step number
//! makes lexical order equal step order, so "latest" is a directory listing
//! away. The wire format comes from the store's [`SerializerProtocol`]
//! parameter (JSON by default).
//!
//! Writes go through a temp file + rename so a crash mid-write never leaves a
//! truncated checkpoint behind.

use crate::checkpoint::Checkpoint;
use crate::error::{CheckpointError, Result};
use crate::serializer::{JsonSerializer, SerializerProtocol};
use crate::traits::CheckpointStore;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Checkpoint store writing one file per snapshot under a root directory
///
/// # Example
///
/// ```rust,no_run
/// use flowgraph_checkpoint::{Checkpoint, CheckpointStore, FileCheckpointStore};
/// use serde_json::json;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let store = FileCheckpointStore::new("/var/lib/flowgraph/checkpoints");
/// let checkpoint = Checkpoint::new("exec-1", 1, "a", vec!["a".into()], json!({}));
///
/// store.save(&checkpoint).await?;
/// let latest = store.load_latest("exec-1").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct FileCheckpointStore<S: SerializerProtocol = JsonSerializer> {
    root: PathBuf,
    serializer: S,
}

impl FileCheckpointStore<JsonSerializer> {
    /// Create a JSON-format store rooted at `root`
    ///
    /// The directory is created lazily on first save.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            serializer: JsonSerializer::new(),
        }
    }
}

impl<S: SerializerProtocol> FileCheckpointStore<S> {
    /// Create a store with a custom serializer
    pub fn with_serializer(root: impl Into<PathBuf>, serializer: S) -> Self {
        Self {
            root: root.into(),
            serializer,
        }
    }

    /// Root directory this store writes under
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn execution_dir(&self, execution_id: &str) -> Result<PathBuf> {
        // Execution ids become directory names; reject separators outright
        // rather than silently nesting.
        if execution_id.is_empty()
            || execution_id.contains(std::path::MAIN_SEPARATOR)
            || execution_id.contains('/')
        {
            return Err(CheckpointError::Invalid(format!(
                "execution id '{}' is not usable as a directory name",
                execution_id
            )));
        }
        Ok(self.root.join(execution_id))
    }

    fn file_name(&self, step: u64) -> String {
        format!("step_{:08}.{}", step, self.serializer.extension())
    }

    async fn read_checkpoint(&self, path: &Path) -> Result<Checkpoint> {
        let bytes = tokio::fs::read(path).await?;
        self.serializer.loads(&bytes)
    }

    async fn checkpoint_files(&self, execution_id: &str) -> Result<Vec<PathBuf>> {
        let dir = self.execution_dir(execution_id)?;
        let mut files = Vec::new();

        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(files),
            Err(e) => return Err(e.into()),
        };

        let suffix = format!(".{}", self.serializer.extension());
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.starts_with("step_") && name.ends_with(&suffix) {
                files.push(entry.path());
            }
        }

        // Zero-padded step numbers: lexical order == step order.
        files.sort();
        Ok(files)
    }
}

#[async_trait]
impl<S: SerializerProtocol> CheckpointStore for FileCheckpointStore<S> {
    async fn save(&self, checkpoint: &Checkpoint) -> Result<()> {
        let dir = self.execution_dir(&checkpoint.execution_id)?;
        tokio::fs::create_dir_all(&dir).await?;

        let bytes = self.serializer.dumps(checkpoint)?;
        let target = dir.join(self.file_name(checkpoint.step));
        let tmp = dir.join(format!(
            ".{}.{}",
            checkpoint.checkpoint_id,
            self.serializer.extension()
        ));

        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &target).await?;

        debug!(
            execution_id = %checkpoint.execution_id,
            step = checkpoint.step,
            path = %target.display(),
            "checkpoint written"
        );
        Ok(())
    }

    async fn load_latest(&self, execution_id: &str) -> Result<Option<Checkpoint>> {
        let files = self.checkpoint_files(execution_id).await?;
        match files.last() {
            Some(path) => Ok(Some(self.read_checkpoint(path).await?)),
            None => Ok(None),
        }
    }

    async fn list(&self, execution_id: &str) -> Result<Vec<Checkpoint>> {
        let files = self.checkpoint_files(execution_id).await?;
        let mut checkpoints = Vec::with_capacity(files.len());
        for path in &files {
            checkpoints.push(self.read_checkpoint(path).await?);
        }
        Ok(checkpoints)
    }

    async fn delete(&self, execution_id: &str) -> Result<()> {
        let dir = self.execution_dir(execution_id)?;
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
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
    async fn save_and_load_latest() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCheckpointStore::new(dir.path());

        store.save(&checkpoint(1)).await.unwrap();
        store.save(&checkpoint(2)).await.unwrap();

        let latest = store.load_latest("exec-1").await.unwrap().unwrap();
        assert_eq!(latest.step, 2);
        assert_eq!(latest.current_node, "n1");
    }

    #[tokio::test]
    async fn missing_execution_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCheckpointStore::new(dir.path());
        assert!(store.load_latest("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_is_ascending() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCheckpointStore::new(dir.path());
        for step in [3, 1, 2] {
            store.save(&checkpoint(step)).await.unwrap();
        }

        let steps: Vec<u64> = store
            .list("exec-1")
            .await
            .unwrap()
            .iter()
            .map(|c| c.step)
            .collect();
        assert_eq!(steps, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn same_step_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCheckpointStore::new(dir.path());

        store.save(&checkpoint(1)).await.unwrap();
        let mut replacement = checkpoint(1);
        replacement.state = json!({"replaced": true});
        store.save(&replacement).await.unwrap();

        let all = store.list("exec-1").await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].state, json!({"replaced": true}));
    }

    #[tokio::test]
    async fn delete_removes_directory() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCheckpointStore::new(dir.path());

        store.save(&checkpoint(1)).await.unwrap();
        store.delete("exec-1").await.unwrap();

        assert!(store.list("exec-1").await.unwrap().is_empty());
        // Deleting twice is fine.
        store.delete("exec-1").await.unwrap();
    }

    #[tokio::test]
    async fn rejects_path_separator_in_execution_id() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCheckpointStore::new(dir.path());
        let mut bad = checkpoint(1);
        bad.execution_id = "../escape".to_string();

        assert!(matches!(
            store.save(&bad).await,
            Err(CheckpointError::Invalid(_))
        ));
    }
}
