//! Default configuration values
//!
//! These back the CLI/environment defaults and the `Default` impls of the
//! rate budget and retry policy.

use std::time::Duration;

/// Default Asana REST base URL.
pub const DEFAULT_BASE_URL: &str = "https://app.asana.com/api/1.0";

/// Default output directory for persisted items.
pub const DEFAULT_OUTPUT_DIR: &str = "./output";

/// Default extraction schedule: every five minutes.
pub const DEFAULT_SCHEDULE_CRON: &str = "*/5 * * * *";

/// Requests per minute allowed by the global token bucket.
/// Asana's free tier allows 150 requests per minute per token.
pub const REQUESTS_PER_MINUTE: u32 = 150;

/// Maximum concurrent GET/HEAD requests.
/// Asana caps concurrent reads at 50 per token.
pub const MAX_CONCURRENT_READ: usize = 50;

/// Maximum concurrent POST/PUT/PATCH/DELETE requests.
/// Asana caps concurrent writes at 15 per token.
pub const MAX_CONCURRENT_WRITE: usize = 15;

/// Maximum number of retries after the first attempt (6 attempts in total).
pub const MAX_RETRIES: u32 = 5;

/// Initial backoff delay in milliseconds, doubled on each attempt.
pub const INITIAL_BACKOFF_MS: u64 = 1_000;

/// Upper bound on any computed backoff delay, in milliseconds.
pub const MAX_BACKOFF_MS: u64 = 60_000;

/// Overall timeout for one HTTP request, in seconds.
pub const HTTP_TIMEOUT_SECS: u64 = 30;

/// Time allowed to establish a TCP connection, in seconds.
pub const HTTP_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default page size for user listings.
pub const USER_PAGE_SIZE: usize = 100;

/// Default page size for project listings.
pub const PROJECT_PAGE_SIZE: usize = 100;

/// Capacity of the stats update channel between producers and the aggregator.
pub const STATS_CHANNEL_CAPACITY: usize = 100;

/// Default initial backoff as a [`Duration`].
pub fn initial_backoff() -> Duration {
    Duration::from_millis(INITIAL_BACKOFF_MS)
}

/// Default maximum backoff as a [`Duration`].
pub fn max_backoff() -> Duration {
    Duration::from_millis(MAX_BACKOFF_MS)
}

/// Default HTTP request timeout as a [`Duration`].
pub fn http_timeout() -> Duration {
    Duration::from_secs(HTTP_TIMEOUT_SECS)
}
