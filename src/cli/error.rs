//! CLI error types and conversions

use crate::client::ClientError;
use crate::scheduler::SchedulerError;
use crate::storage::StorageError;

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// HTTP client could not be built
    #[error("client error: {0}")]
    ClientError(#[from] ClientError),

    /// Output directory could not be prepared
    #[error("storage error: {0}")]
    StorageError(#[from] StorageError),

    /// Schedule could not be created
    #[error("scheduler error: {0}")]
    SchedulerError(#[from] SchedulerError),

    /// Invalid argument
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Extraction run failed
    #[error("extraction failed: {0}")]
    ExtractionFailed(String),
}
