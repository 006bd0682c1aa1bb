//! Item persistence

use crate::{Project, User};

pub mod json;

pub use json::JsonStorage;

/// Storage errors
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Item could not be encoded
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Global ID unusable as a file name
    #[error("invalid item id: {0:?}")]
    InvalidId(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Per-item persistence capability.
///
/// Each call stores one item; a failure affects that item only.
pub trait Storage: Send + Sync {
    /// Persist one user
    fn write_user(&self, user: &User) -> StorageResult<()>;

    /// Persist one project
    fn write_project(&self, project: &Project) -> StorageResult<()>;
}
