//! Operational metrics for the extractor
//!
//! Counters and histograms for HTTP attempts, retries, admission waits and
//! per-class persistence outcomes.
//!
//! ## Architecture
//!
//! - Uses the `metrics` facade; recording is a no-op until a recorder is installed
//! - [`init_metrics`] installs a Prometheus exporter with a scrape endpoint
//! - Nothing here blocks the request path

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::Lazy;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::client::limiter::RequestClass;
use crate::extractor::ResourceClass;

/// Guards against installing the exporter twice.
static METRICS_INITIALIZED: Lazy<Mutex<bool>> = Lazy::new(|| Mutex::new(false));

/// Monotonic source of request correlation IDs.
static CORRELATION_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Wait above which an admission is logged.
const SLOW_ADMISSION: Duration = Duration::from_millis(100);

/// Metrics initialisation errors
#[derive(Debug, thiserror::Error)]
#[error("failed to install Prometheus exporter: {0}")]
pub struct MetricsError(String);

/// Install the Prometheus exporter and describe all metrics.
///
/// Idempotent: a second call logs and returns `Ok(())`.
///
/// # Errors
/// Returns [`MetricsError`] if the listener cannot be installed.
pub async fn init_metrics(addr: SocketAddr) -> Result<(), MetricsError> {
    let mut initialized = METRICS_INITIALIZED.lock().await;
    if *initialized {
        debug!("Metrics already initialized, skipping");
        return Ok(());
    }

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| MetricsError(e.to_string()))?;

    describe_counter!("http_requests_total", Unit::Count, "HTTP attempts made to the API");
    describe_counter!("http_429_errors_total", Unit::Count, "429 rate limit responses received");
    describe_counter!("http_retries_total", Unit::Count, "Retries scheduled after a failed attempt");
    describe_histogram!("http_request_duration_seconds", Unit::Seconds, "Duration of one HTTP attempt");
    describe_histogram!("retry_backoff_duration_seconds", Unit::Seconds, "Backoff applied before a retry");
    describe_histogram!("admission_wait_seconds", Unit::Seconds, "Time spent waiting in the admission limiter");
    describe_gauge!("admission_in_flight", Unit::Count, "Requests currently holding an admission slot");
    describe_counter!("items_persisted_total", Unit::Count, "Items written to storage");
    describe_counter!("items_failed_total", Unit::Count, "Items that failed to persist");
    describe_counter!("extractions_completed_total", Unit::Count, "Extraction runs that completed");
    describe_counter!("extractions_failed_total", Unit::Count, "Extraction runs that failed");

    *initialized = true;
    info!(%addr, "Metrics exporter listening");
    Ok(())
}

/// Whether [`init_metrics`] has succeeded.
pub async fn is_initialized() -> bool {
    *METRICS_INITIALIZED.lock().await
}

/// Generate a new correlation ID for request tracing.
pub fn generate_correlation_id() -> String {
    let id = CORRELATION_COUNTER.fetch_add(1, Ordering::Relaxed) + 1;
    format!("req-{id:08x}")
}

/// Timing and outcome of one HTTP attempt.
pub struct HttpRequestMetrics {
    start_time: Instant,
    correlation_id: String,
    attempt: u32,
}

impl HttpRequestMetrics {
    /// Start timing attempt number `attempt` (1-based).
    pub fn start(attempt: u32) -> Self {
        Self {
            start_time: Instant::now(),
            correlation_id: generate_correlation_id(),
            attempt,
        }
    }

    /// Record an attempt that produced a response.
    pub fn record_complete(&self, status_code: u16) {
        let duration = self.start_time.elapsed();

        counter!(
            "http_requests_total",
            "status" => status_code.to_string(),
            "attempt" => self.attempt.to_string(),
        )
        .increment(1);
        histogram!("http_request_duration_seconds").record(duration.as_secs_f64());

        if status_code == 429 {
            counter!("http_429_errors_total").increment(1);
        }

        debug!(
            correlation_id = %self.correlation_id,
            attempt = self.attempt,
            status = status_code,
            duration_ms = duration.as_millis() as u64,
            "HTTP attempt completed"
        );
    }

    /// Record an attempt that failed without a response.
    pub fn record_network_error(&self) {
        let duration = self.start_time.elapsed();

        counter!(
            "http_requests_total",
            "status" => "network_error",
            "attempt" => self.attempt.to_string(),
        )
        .increment(1);
        histogram!("http_request_duration_seconds").record(duration.as_secs_f64());

        debug!(
            correlation_id = %self.correlation_id,
            attempt = self.attempt,
            duration_ms = duration.as_millis() as u64,
            "HTTP attempt failed without response"
        );
    }

    /// Correlation ID of this attempt.
    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }
}

/// Record a scheduled retry and its backoff.
pub fn record_retry_backoff(duration: Duration, attempt: u32) {
    counter!("http_retries_total", "attempt" => attempt.to_string()).increment(1);
    histogram!("retry_backoff_duration_seconds").record(duration.as_secs_f64());
}

/// Admission wait measurement for one `acquire` call.
pub struct AdmissionMetrics {
    class: RequestClass,
    start_time: Instant,
}

impl AdmissionMetrics {
    /// Start measuring a wait for `class`.
    pub fn start(class: RequestClass) -> Self {
        Self {
            class,
            start_time: Instant::now(),
        }
    }

    /// Record that a slot was granted; `in_flight` is the count after the grant.
    pub fn record_admitted(&mut self, in_flight: usize) {
        let waited = self.start_time.elapsed();
        histogram!("admission_wait_seconds", "class" => self.class.as_str()).record(waited.as_secs_f64());
        Self::record_in_flight(self.class, in_flight);

        if waited > SLOW_ADMISSION {
            debug!(
                class = %self.class,
                wait_ms = waited.as_millis() as u64,
                in_flight,
                "Admission granted after wait"
            );
        }
    }

    /// Update the in-flight gauge for `class`.
    pub fn record_in_flight(class: RequestClass, in_flight: usize) {
        gauge!("admission_in_flight", "class" => class.as_str()).set(in_flight as f64);
    }
}

/// Per-item persistence outcome.
pub fn record_item(class: ResourceClass, persisted: bool) {
    if persisted {
        counter!("items_persisted_total", "class" => class.as_str()).increment(1);
    } else {
        counter!("items_failed_total", "class" => class.as_str()).increment(1);
    }
}

/// Timing and outcome of one extraction run.
pub struct ExtractionMetrics {
    start_time: Instant,
}

impl Default for ExtractionMetrics {
    fn default() -> Self {
        Self::start()
    }
}

impl ExtractionMetrics {
    /// Start timing a run.
    pub fn start() -> Self {
        Self {
            start_time: Instant::now(),
        }
    }

    /// Record a completed run.
    pub fn record_success(&self, items: u64, errors: u64) {
        counter!("extractions_completed_total").increment(1);
        info!(
            items,
            errors,
            duration_ms = self.start_time.elapsed().as_millis() as u64,
            "Extraction completed"
        );
    }

    /// Record a run that ended with a fatal error.
    pub fn record_failure(&self, error: &str) {
        counter!("extractions_failed_total").increment(1);
        warn!(
            error = %error,
            duration_ms = self.start_time.elapsed().as_millis() as u64,
            "Extraction failed"
        );
    }
}
