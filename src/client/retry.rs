//! Bounded retry with exponential backoff
//!
//! Retries on:
//! - transport errors (no response at all)
//! - 429 rate limit responses
//! - 5xx server errors
//!
//! Every other response, success or failure, ends the loop and is handed back
//! to the caller untouched.

use reqwest::StatusCode;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use super::backoff::{compute_backoff, parse_retry_after};
use super::outcome::{AttemptOutcome, RetryReason};
use crate::cancel::Cancellation;
use crate::config;
use crate::metrics::{record_retry_backoff, HttpRequestMetrics};

/// Retry configuration shared read-only across calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry, doubled each time
    pub initial_backoff: Duration,
    /// Upper bound on computed delays
    pub max_backoff: Duration,
}

impl RetryPolicy {
    /// Create a policy.
    pub fn new(max_retries: u32, initial_backoff: Duration, max_backoff: Duration) -> Self {
        Self {
            max_retries,
            initial_backoff,
            max_backoff,
        }
    }

    /// Total number of attempts the policy allows.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(config::MAX_RETRIES, config::initial_backoff(), config::max_backoff())
    }
}

/// What the retry loop needs to know about a response.
pub trait AttemptResponse {
    /// HTTP status of the response.
    fn status(&self) -> StatusCode;

    /// Server-supplied wait hint, if any.
    fn retry_after(&self) -> Option<Duration>;
}

impl AttemptResponse for reqwest::Response {
    fn status(&self) -> StatusCode {
        reqwest::Response::status(self)
    }

    fn retry_after(&self) -> Option<Duration> {
        parse_retry_after(self.headers())
    }
}

/// Retry executor errors
#[derive(Debug, thiserror::Error)]
pub enum RetryError<E> {
    /// Cancellation fired during an attempt or between attempts
    #[error("request cancelled")]
    Cancelled,

    /// Every attempt failed without a response
    #[error("max retries exceeded after {attempts} attempts: {source}")]
    TransportExhausted {
        /// Attempts made
        attempts: u32,
        /// Error of the last attempt
        #[source]
        source: E,
    },

    /// Every attempt got a retryable status
    #[error("max retries exceeded after {attempts} attempts, last status: {status}")]
    StatusExhausted {
        /// Attempts made
        attempts: u32,
        /// Status of the last attempt
        status: StatusCode,
    },
}

impl<E> RetryError<E> {
    /// Whether the loop ended because of cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

enum LastFailure<E> {
    Transport(E),
    Status(StatusCode),
}

impl<E> LastFailure<E> {
    fn exhausted(self, attempts: u32) -> RetryError<E> {
        match self {
            Self::Transport(source) => RetryError::TransportExhausted { attempts, source },
            Self::Status(status) => RetryError::StatusExhausted { attempts, status },
        }
    }
}

/// Run `operation` until it yields a non-retryable outcome or the policy is exhausted.
///
/// `operation` receives the zero-based attempt index and must perform exactly
/// one network call. A discarded response is dropped before the backoff wait.
///
/// # Errors
/// - [`RetryError::Cancelled`] if `cancel` fires during or between attempts;
///   an in-flight attempt is dropped
/// - [`RetryError::TransportExhausted`] / [`RetryError::StatusExhausted`] after
///   `max_retries + 1` retryable failures
pub async fn execute<R, E, F, Fut>(
    policy: &RetryPolicy,
    cancel: &Cancellation,
    mut operation: F,
) -> Result<R, RetryError<E>>
where
    R: AttemptResponse,
    E: std::fmt::Display,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<R, E>>,
{
    let max_attempts = policy.max_attempts();
    let mut attempt: u32 = 0;

    loop {
        if cancel.is_cancelled() {
            return Err(RetryError::Cancelled);
        }

        let metrics = HttpRequestMetrics::start(attempt + 1);
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RetryError::Cancelled),
            result = operation(attempt) => result,
        };
        let (reason, hint, last) = match result {
            Ok(response) => {
                let status = response.status();
                metrics.record_complete(status.as_u16());
                match AttemptOutcome::classify_status(status, response.retry_after()) {
                    AttemptOutcome::Retryable { reason, hint } => {
                        drop(response);
                        (reason, hint, LastFailure::Status(status))
                    }
                    AttemptOutcome::Success | AttemptOutcome::Terminal(_) => {
                        if attempt > 0 {
                            debug!(attempt = attempt + 1, status = %status, "request settled after retry");
                        }
                        return Ok(response);
                    }
                }
            }
            Err(err) => {
                metrics.record_network_error();
                warn!(attempt = attempt + 1, max_attempts, error = %err, "transport error");
                (RetryReason::Transport, None, LastFailure::Transport(err))
            }
        };

        if attempt >= policy.max_retries {
            warn!(attempts = max_attempts, reason = reason.description(), "max retries exceeded");
            return Err(last.exhausted(max_attempts));
        }

        let backoff = compute_backoff(attempt, policy, hint);
        warn!(
            attempt = attempt + 1,
            max_attempts,
            reason = reason.description(),
            backoff_ms = backoff.as_millis() as u64,
            server_hint = hint.is_some(),
            "retrying after backoff"
        );
        record_retry_backoff(backoff, attempt + 1);

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RetryError::Cancelled),
            _ = tokio::time::sleep(backoff) => {}
        }

        attempt += 1;
    }
}
