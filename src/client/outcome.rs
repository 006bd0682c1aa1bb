//! Classification of a single request attempt.
//!
//! The retry executor never inspects status codes directly; it asks
//! [`AttemptOutcome::classify_status`] and acts on the closed set of outcomes.

use reqwest::StatusCode;
use std::time::Duration;

/// Why an attempt may be retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryReason {
    /// No response: connection refused, DNS failure, timeout, reset
    Transport,
    /// HTTP 429
    RateLimited,
    /// HTTP 5xx
    ServerError(u16),
}

impl RetryReason {
    /// Short description used in retry log lines.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Transport => "transport error",
            Self::RateLimited => "rate limit exceeded",
            Self::ServerError(code) => match code {
                500 => "internal server error",
                502 => "bad gateway",
                503 => "service unavailable",
                504 => "gateway timeout",
                _ => "server error",
            },
        }
    }
}

/// Outcome of one attempt, as seen by the retry loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// 2xx; returned to the caller
    Success,
    /// Worth another attempt, optionally after a server-supplied delay
    Retryable {
        /// Cause of the failure
        reason: RetryReason,
        /// Parsed `Retry-After`, if any
        hint: Option<Duration>,
    },
    /// Anything else (3xx, 4xx other than 429); returned to the caller as-is
    Terminal(StatusCode),
}

impl AttemptOutcome {
    /// Classify a response status. `hint` is only kept for retryable outcomes.
    pub fn classify_status(status: StatusCode, hint: Option<Duration>) -> Self {
        if status == StatusCode::TOO_MANY_REQUESTS {
            Self::Retryable {
                reason: RetryReason::RateLimited,
                hint,
            }
        } else if status.is_server_error() {
            Self::Retryable {
                reason: RetryReason::ServerError(status.as_u16()),
                hint,
            }
        } else if status.is_success() {
            Self::Success
        } else {
            Self::Terminal(status)
        }
    }

    /// Whether the retry loop should try again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable { .. })
    }
}
