//! Error types for checkpoint operations

use thiserror::Error;

/// Result type for checkpoint operations
pub type Result<T> = std::result::Result<T, CheckpointError>;

/// Errors that can occur while saving, loading, or listing checkpoints
#[derive(Error, Debug)]
pub enum CheckpointError {
    /// No checkpoint exists for the requested execution
    #[error("Checkpoint not found for execution '{0}'")]
    NotFound(String),

    /// JSON serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Binary serialization error
    #[error("Binary serialization error: {0}")]
    BinarySerialization(#[from] bincode::Error),

    /// Backend storage failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Checkpoint payload failed validation
    #[error("Invalid checkpoint: {0}")]
    Invalid(String),

    /// I/O error from a filesystem-backed store
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
