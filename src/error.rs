//! Error types for the snapshot store.

use crate::types::{Hash, SaveId};
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for repository operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Repository not initialized, run 'bit init' first")]
    NotInitialized,

    #[error("Repository already initialized")]
    AlreadyInitialized,

    #[error("Save not found: {0}")]
    SaveNotFound(SaveId),

    #[error("Blob not found: {path} in save {save_id}")]
    BlobNotFound { save_id: SaveId, path: String },

    #[error("File {path} is not part of save {save_id}")]
    FileNotInSave { save_id: SaveId, path: String },

    #[error("Delta set not found for save {0}")]
    DeltaSetNotFound(SaveId),

    #[error("Delta for {path} not found in save {save_id}")]
    DeltaNotFound { save_id: SaveId, path: String },

    #[error("No files to save")]
    NoFilesToSave,

    #[error("Hash mismatch for {path}: expected {expected}, got {got}")]
    HashMismatch {
        path: String,
        expected: Hash,
        got: Hash,
    },

    #[error("Corruption detected: {0}")]
    Corruption(String),

    #[error("Cannot apply patch to {path}: {reason}")]
    Patch { path: String, reason: String },

    #[error("Delta chain for {path} at save {save_id} exceeds {hops} hops")]
    ChainTooLong {
        save_id: SaveId,
        path: String,
        hops: usize,
    },

    #[error("Invalid ignore pattern {pattern:?}: {reason}")]
    InvalidIgnorePattern { pattern: String, reason: String },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}

impl StoreError {
    /// Wrap an IO error with the path it happened on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }

    /// True for every "the thing you asked for does not exist" failure.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StoreError::SaveNotFound(_)
                | StoreError::BlobNotFound { .. }
                | StoreError::FileNotInSave { .. }
                | StoreError::DeltaSetNotFound(_)
                | StoreError::DeltaNotFound { .. }
        )
    }

    /// True when stored content failed verification and must not be trusted.
    pub fn is_integrity_error(&self) -> bool {
        matches!(
            self,
            StoreError::HashMismatch { .. } | StoreError::Corruption(_)
        )
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

/// Result type for repository operations.
pub type Result<T> = std::result::Result<T, StoreError>;
