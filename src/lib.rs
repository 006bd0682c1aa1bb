//! # Asana Extractor Library
//!
//! Periodically extracts the users and projects of an Asana workspace to local
//! JSON files, while staying inside the API's rate and concurrency limits.
//!
//! ## Features
//!
//! - **Admission Control**: A per-minute token bucket plus independent read/write concurrency ceilings
//! - **Retry with Backoff**: Bounded retries with jittered exponential backoff, honouring `Retry-After`
//! - **Lazy Pagination**: Offset-cursor listings streamed page by page
//! - **Concurrent Extraction**: One task per resource class, stats aggregated by a single owner
//! - **Cooperative Cancellation**: One signal stops every wait, retry and producer
//!
//! ## Quick Start
//!
//! ```no_run
//! use asana_extractor::cancel::Cancellation;
//! use asana_extractor::client::{ClientConfig, RateBudget, ResilientClient, RetryPolicy};
//! use asana_extractor::extractor::Extractor;
//! use asana_extractor::fetcher::AsanaClient;
//! use asana_extractor::storage::JsonStorage;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let http = ResilientClient::new(ClientConfig {
//!     token: "0/abc123".to_string(),
//!     rate_budget: RateBudget::default(),
//!     retry_policy: RetryPolicy::default(),
//!     timeout: Duration::from_secs(30),
//! })?;
//! let source = AsanaClient::new(Arc::new(http), "12345", "https://app.asana.com/api/1.0");
//! let storage = JsonStorage::new("./output")?;
//!
//! let extractor = Extractor::new(Arc::new(source), Arc::new(storage));
//! let stats = extractor.run(&Cancellation::shared()).await?;
//! println!("{stats}");
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`client`] - Admission limiter, backoff, retry executor and the resilient HTTP client
//! - [`fetcher`] - Cursor pagination and the Asana listing endpoints
//! - [`storage`] - Per-item JSON persistence
//! - [`extractor`] - Concurrent extraction run with single-owner stats aggregation
//! - [`scheduler`] - Cron-scheduled repetition of extraction runs
//! - [`cancel`] - Cancellation signal shared by every suspension point

#![warn(missing_docs)]
#![warn(clippy::all)]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Cancellation signal
pub mod cancel;

/// CLI definition
pub mod cli;

/// Resilient HTTP client
pub mod client;

/// Default limits and timeouts
pub mod config;

/// Extraction orchestration
pub mod extractor;

/// Resource fetchers
pub mod fetcher;

/// Metrics collection and reporting
pub mod metrics;

/// Cron scheduling of extraction runs
pub mod scheduler;

/// Item persistence
pub mod storage;

// Re-export commonly used types
pub use cancel::{Cancellation, SharedCancellation};
pub use extractor::{ExtractionStats, Extractor};

/// Asana workspace reference
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Workspace {
    /// Global ID
    pub gid: String,
    /// Always `workspace`
    #[serde(default)]
    pub resource_type: String,
    /// Display name
    #[serde(default)]
    pub name: String,
}

/// Asana team reference
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Team {
    /// Global ID
    pub gid: String,
    /// Always `team`
    #[serde(default)]
    pub resource_type: String,
    /// Display name
    #[serde(default)]
    pub name: String,
}

/// Asana user
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    /// Global ID, also the file name of the persisted record
    pub gid: String,
    /// Always `user`
    #[serde(default)]
    pub resource_type: String,
    /// Display name
    #[serde(default)]
    pub name: String,
    /// Only present for users visible to the token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Workspaces the user belongs to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspaces: Option<Vec<Workspace>>,
}

/// Asana project
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Project {
    /// Global ID, also the file name of the persisted record
    pub gid: String,
    /// Always `project`
    #[serde(default)]
    pub resource_type: String,
    /// Display name
    #[serde(default)]
    pub name: String,
    /// Archived projects are still listed
    #[serde(default)]
    pub archived: bool,
    /// Colour label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// Creation time
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// Last modification time
    #[serde(default)]
    pub modified_at: Option<DateTime<Utc>>,
    /// Owner, absent for ownerless projects
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<User>,
    /// Visible to the whole workspace
    #[serde(default)]
    pub public: bool,
    /// Containing workspace
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace: Option<Workspace>,
    /// Owning team, organisations only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team: Option<Team>,
}
