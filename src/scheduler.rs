//! Cron scheduling of extraction runs
//!
//! The job runs once immediately, then at every fire time of a cron expression
//! until the cancellation signal fires. Fire times that pass while a run is
//! still in progress are skipped, so runs never overlap or burst.
//!
//! Expressions carry a seconds field (`sec min hour dom month dow [year]`).
//! Standard five-field expressions are accepted too and fire at second 0.

use chrono::{DateTime, Utc};
use std::future::Future;
use std::str::FromStr;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::cancel::Cancellation;

/// Scheduler errors
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    /// Expression could not be parsed
    #[error("invalid cron expression '{expression}': {reason}")]
    InvalidExpression {
        /// Expression as given
        expression: String,
        /// Parser message
        reason: String,
    },
}

/// Repeats a job on a cron schedule.
#[derive(Debug, Clone)]
pub struct Scheduler {
    expression: String,
    schedule: cron::Schedule,
}

impl Scheduler {
    /// Parse `expression` into a scheduler.
    pub fn parse(expression: &str) -> Result<Self, SchedulerError> {
        let expression = expression.trim();
        let normalized = if expression.split_whitespace().count() == 5 {
            format!("0 {expression}")
        } else {
            expression.to_string()
        };

        let schedule = cron::Schedule::from_str(&normalized).map_err(|e| SchedulerError::InvalidExpression {
            expression: expression.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            expression: expression.to_string(),
            schedule,
        })
    }

    /// Expression as configured
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// First fire time strictly after `after`.
    pub fn next_fire(&self, after: &DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule.after(after).next()
    }

    /// Run `job` until `cancel` fires; returns the number of runs started.
    ///
    /// A run in progress is not interrupted here. The job is expected to observe
    /// the same signal.
    pub async fn run<F, Fut>(&self, cancel: &Cancellation, job: F) -> u64
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ()>,
    {
        self.run_from(Utc::now(), cancel, job).await
    }

    /// [`run`](Self::run) with the wall clock pinned to `started_at` at the
    /// current runtime instant. Later wall times are derived from the runtime
    /// clock, so a paused test clock drives the schedule.
    async fn run_from<F, Fut>(&self, started_at: DateTime<Utc>, cancel: &Cancellation, mut job: F) -> u64
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ()>,
    {
        let origin = Instant::now();
        let wall_now = || started_at + chrono::Duration::from_std(origin.elapsed()).unwrap_or_default();
        info!(cron = %self.expression, "Scheduler started");

        let mut runs = 0u64;
        if !cancel.is_cancelled() {
            loop {
                runs += 1;
                info!(run = runs, "Running scheduled extraction");
                job().await;

                if cancel.is_cancelled() {
                    warn!(run = runs, "Cancelled during scheduled run");
                    break;
                }

                let now = wall_now();
                let Some(next) = self.next_fire(&now) else {
                    warn!(cron = %self.expression, "Schedule has no upcoming fire time");
                    break;
                };
                let wait = (next - now).to_std().unwrap_or_default();
                debug!(next = %next, wait_ms = wait.as_millis() as u64, "Waiting for next fire time");

                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep_until(Instant::now() + wait) => {}
                }
            }
        }

        info!(runs, "Scheduler stopped");
        runs
    }
}
