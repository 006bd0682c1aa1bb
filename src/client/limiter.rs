//! Admission limiter: global request rate plus per-class concurrency caps
//!
//! Every request first takes a token from a process-wide token bucket
//! (requests per minute), then claims an in-flight slot for its class.
//! Reads and writes have independent ceilings.

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter as GovernorRateLimiter};
use reqwest::Method;
use std::fmt;
use std::num::NonZeroU32;
use std::sync::Mutex;
use tokio::sync::Notify;
use tracing::{debug, trace};

use crate::cancel::Cancellation;
use crate::config::{MAX_CONCURRENT_READ, MAX_CONCURRENT_WRITE, REQUESTS_PER_MINUTE};
use crate::metrics::AdmissionMetrics;

type TokenBucket = GovernorRateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Operation class used to pick a concurrency ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestClass {
    /// Idempotent retrieval (GET, HEAD)
    Read,
    /// Anything that may change server state
    Write,
}

impl RequestClass {
    /// Classify an HTTP method.
    pub fn from_method(method: &Method) -> Self {
        if method == Method::GET || method == Method::HEAD {
            Self::Read
        } else {
            Self::Write
        }
    }

    /// Lowercase label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
        }
    }
}

impl fmt::Display for RequestClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Limits enforced by an [`AdmissionLimiter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateBudget {
    /// Token bucket refill rate and burst capacity
    pub requests_per_minute: u32,
    /// Ceiling on in-flight reads
    pub max_concurrent_read: usize,
    /// Ceiling on in-flight writes
    pub max_concurrent_write: usize,
}

impl RateBudget {
    /// Create a budget.
    pub fn new(requests_per_minute: u32, max_concurrent_read: usize, max_concurrent_write: usize) -> Self {
        Self {
            requests_per_minute,
            max_concurrent_read,
            max_concurrent_write,
        }
    }

    fn ceiling(&self, class: RequestClass) -> usize {
        match class {
            RequestClass::Read => self.max_concurrent_read,
            RequestClass::Write => self.max_concurrent_write,
        }
    }
}

impl Default for RateBudget {
    fn default() -> Self {
        Self::new(REQUESTS_PER_MINUTE, MAX_CONCURRENT_READ, MAX_CONCURRENT_WRITE)
    }
}

/// Admission limiter errors
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum LimiterError {
    /// Cancellation fired while waiting for a token or a slot
    #[error("cancelled while waiting for admission")]
    Cancelled,

    /// Budget with a zero rate or zero ceiling
    #[error("invalid rate budget: {0}")]
    InvalidBudget(String),
}

#[derive(Debug, Default)]
struct InFlight {
    reads: usize,
    writes: usize,
}

impl InFlight {
    fn slot(&mut self, class: RequestClass) -> &mut usize {
        match class {
            RequestClass::Read => &mut self.reads,
            RequestClass::Write => &mut self.writes,
        }
    }
}

/// Dual-axis limiter shared by every request of the process.
///
/// In-flight counters live behind one mutex and are never exposed mutably.
/// Waiters for a slot are woken by [`release`](Self::release) rather than by
/// polling; each release wakes at most one waiter of the same class.
pub struct AdmissionLimiter {
    budget: RateBudget,
    bucket: TokenBucket,
    in_flight: Mutex<InFlight>,
    read_released: Notify,
    write_released: Notify,
}

impl AdmissionLimiter {
    /// Build a limiter from a budget.
    ///
    /// # Errors
    /// Returns [`LimiterError::InvalidBudget`] if the rate or either ceiling is zero.
    pub fn new(budget: RateBudget) -> Result<Self, LimiterError> {
        let rpm = NonZeroU32::new(budget.requests_per_minute).ok_or_else(|| {
            LimiterError::InvalidBudget("requests per minute must be at least 1".to_string())
        })?;
        if budget.max_concurrent_read == 0 || budget.max_concurrent_write == 0 {
            return Err(LimiterError::InvalidBudget(
                "concurrency ceilings must be at least 1".to_string(),
            ));
        }

        // Bucket starts full: a burst of one minute's worth of requests is allowed.
        let quota = Quota::per_minute(rpm).allow_burst(rpm);

        Ok(Self {
            budget,
            bucket: GovernorRateLimiter::direct(quota),
            in_flight: Mutex::new(InFlight::default()),
            read_released: Notify::new(),
            write_released: Notify::new(),
        })
    }

    /// The budget this limiter enforces.
    pub fn budget(&self) -> &RateBudget {
        &self.budget
    }

    /// Wait for a rate token, then for an in-flight slot of `class`.
    ///
    /// The rate check comes first so throughput stays capped even when
    /// concurrency headroom is available. If cancellation fires while waiting,
    /// no counter has been incremented.
    pub async fn acquire(&self, class: RequestClass, cancel: &Cancellation) -> Result<(), LimiterError> {
        let mut metrics = AdmissionMetrics::start(class);

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(LimiterError::Cancelled),
            _ = self.bucket.until_ready() => {}
        }
        trace!(class = %class, "rate token granted");

        let released = self.notifier(class);
        loop {
            let notified = released.notified();
            tokio::pin!(notified);
            // Register interest before testing the counter so a release between
            // the test and the await is not lost.
            notified.as_mut().enable();

            if let Some(current) = self.try_claim(class) {
                metrics.record_admitted(current);
                return Ok(());
            }

            debug!(class = %class, ceiling = self.budget.ceiling(class), "concurrency ceiling reached, waiting for a slot");
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(LimiterError::Cancelled),
                _ = &mut notified => {}
            }
        }
    }

    /// Acquire and return a guard that releases the slot when dropped.
    pub async fn admit(
        &self,
        class: RequestClass,
        cancel: &Cancellation,
    ) -> Result<AdmissionGuard<'_>, LimiterError> {
        self.acquire(class, cancel).await?;
        Ok(AdmissionGuard { limiter: self, class })
    }

    /// Give back an in-flight slot. Releasing with no slot held is a no-op.
    pub fn release(&self, class: RequestClass) {
        let current = {
            let mut in_flight = self.lock();
            let slot = in_flight.slot(class);
            if *slot == 0 {
                return;
            }
            *slot -= 1;
            *slot
        };
        AdmissionMetrics::record_in_flight(class, current);
        self.notifier(class).notify_one();
    }

    /// Snapshot of `(in-flight reads, in-flight writes)`.
    pub fn in_flight(&self) -> (usize, usize) {
        let in_flight = self.lock();
        (in_flight.reads, in_flight.writes)
    }

    fn try_claim(&self, class: RequestClass) -> Option<usize> {
        let ceiling = self.budget.ceiling(class);
        let mut in_flight = self.lock();
        let slot = in_flight.slot(class);
        if *slot < ceiling {
            *slot += 1;
            Some(*slot)
        } else {
            None
        }
    }

    fn notifier(&self, class: RequestClass) -> &Notify {
        match class {
            RequestClass::Read => &self.read_released,
            RequestClass::Write => &self.write_released,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, InFlight> {
        // Counters stay consistent even if a holder panicked: every critical
        // section is a single compare-and-adjust.
        self.in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl fmt::Debug for AdmissionLimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (reads, writes) = self.in_flight();
        f.debug_struct("AdmissionLimiter")
            .field("budget", &self.budget)
            .field("in_flight_reads", &reads)
            .field("in_flight_writes", &writes)
            .finish()
    }
}

/// Scoped admission: releases its slot exactly once when dropped.
#[must_use = "dropping the guard releases the slot immediately"]
pub struct AdmissionGuard<'a> {
    limiter: &'a AdmissionLimiter,
    class: RequestClass,
}

impl AdmissionGuard<'_> {
    /// Class of the held slot.
    pub fn class(&self) -> RequestClass {
        self.class
    }
}

impl Drop for AdmissionGuard<'_> {
    fn drop(&mut self) {
        self.limiter.release(self.class);
    }
}
