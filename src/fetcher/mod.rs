//! Resource fetchers
//!
//! - [`pagination`] - cursor-following page stream shared by every listing
//! - [`asana`] - Asana users/projects endpoints on top of the resilient client

use crate::cancel::Cancellation;
use crate::client::ClientError;
use crate::{Project, User};
use async_trait::async_trait;

pub mod asana;
pub mod pagination;

pub use asana::AsanaClient;
pub use pagination::{fetch_all, paginate, Page};

/// Fetcher errors
#[derive(Debug, thiserror::Error)]
pub enum FetcherError {
    /// Endpoint URL could not be built
    #[error("failed to parse URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The resilient client gave up or saw a terminal status
    #[error("failed to get {resource}: {source}")]
    Request {
        /// Resource being listed
        resource: &'static str,
        /// Underlying client error
        #[source]
        source: ClientError,
    },

    /// Payload was not the expected JSON
    #[error("failed to parse {resource} response: {source}")]
    MalformedResponse {
        /// Resource being listed
        resource: &'static str,
        /// Decoder error
        #[source]
        source: serde_json::Error,
    },

    /// The server never ended the stream
    #[error("pagination exceeded {0} pages - possible infinite loop")]
    TooManyPages(usize),
}

impl FetcherError {
    /// Whether the failure was caused by cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Request { source, .. } if source.is_cancelled())
    }
}

/// Result type for fetcher operations
pub type FetcherResult<T> = Result<T, FetcherError>;

/// Source of complete resource listings consumed by the extractor.
///
/// Each call materialises the whole listing or fails; a partial listing is
/// never returned.
#[async_trait]
pub trait ResourceSource: Send + Sync {
    /// Every user of the workspace, in server order.
    async fn fetch_users(&self, cancel: &Cancellation) -> FetcherResult<Vec<User>>;

    /// Every project of the workspace, in server order.
    async fn fetch_projects(&self, cancel: &Cancellation) -> FetcherResult<Vec<Project>>;
}
