//! Backoff calculation and server wait hints
//!
//! Exponential backoff with ±25% jitter, overridden by a server-supplied
//! `Retry-After` value when one is present.

use rand::Rng;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use std::time::{Duration, SystemTime};

use super::retry::RetryPolicy;

/// Lower bound of the jitter factor.
const JITTER_MIN: f64 = 0.75;
/// Upper bound of the jitter factor.
const JITTER_MAX: f64 = 1.25;

/// Compute how long to wait before the next attempt.
///
/// A positive `server_hint` is returned unchanged. Otherwise the delay is
/// `initial_backoff * 2^attempt` scaled by a random factor in `[0.75, 1.25]`
/// and capped at `max_backoff`. There is no lower clamp.
pub fn compute_backoff(attempt: u32, policy: &RetryPolicy, server_hint: Option<Duration>) -> Duration {
    compute_backoff_with_rng(attempt, policy, server_hint, &mut rand::thread_rng())
}

/// [`compute_backoff`] with an explicit jitter source.
pub fn compute_backoff_with_rng<R: Rng + ?Sized>(
    attempt: u32,
    policy: &RetryPolicy,
    server_hint: Option<Duration>,
    rng: &mut R,
) -> Duration {
    if let Some(hint) = server_hint.filter(|hint| !hint.is_zero()) {
        return hint;
    }
    if policy.initial_backoff.is_zero() {
        return Duration::ZERO;
    }

    let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
    let base = policy.initial_backoff.as_secs_f64() * 2f64.powi(exponent);
    let jittered = base * rng.gen_range(JITTER_MIN..=JITTER_MAX);
    let capped = jittered.min(policy.max_backoff.as_secs_f64());

    // Near Duration::MAX the f64 rounds past the representable range.
    Duration::try_from_secs_f64(capped).unwrap_or(policy.max_backoff)
}

/// Extract the `Retry-After` wait hint from response headers.
///
/// Accepts delay-seconds or an HTTP-date. Missing, malformed, zero and past
/// values all yield `None`.
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let value = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();

    let hint = match value.parse::<u64>() {
        Ok(seconds) => Duration::from_secs(seconds),
        Err(_) => httpdate::parse_http_date(value)
            .ok()?
            .duration_since(SystemTime::now())
            .ok()?,
    };

    (!hint.is_zero()).then_some(hint)
}
