//! Command-line interface
//!
//! Every option falls back to an environment variable, so the binary can be
//! configured entirely from a `.env` file.

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::client::{ClientConfig, RateBudget, ResilientClient, RetryPolicy};
use crate::config;
use crate::extractor::Extractor;
use crate::fetcher::AsanaClient;
use crate::scheduler::Scheduler;
use crate::storage::JsonStorage;

pub mod error;
pub mod extract;

pub use error::CliError;

/// Largest page size accepted by the Asana list endpoints
const MAX_PAGE_SIZE: usize = 100;

/// Parse and validate a page size (1..=100)
fn parse_page_size(s: &str) -> Result<usize, String> {
    let value: usize = s
        .parse()
        .map_err(|_| format!("'{s}' is not a valid number"))?;

    if value == 0 {
        return Err("page size must be at least 1".to_string());
    }
    if value > MAX_PAGE_SIZE {
        return Err(format!("page size {value} exceeds maximum of {MAX_PAGE_SIZE}"));
    }
    Ok(value)
}

/// Parse a positive limit (rate or concurrency ceiling)
fn parse_positive<T>(s: &str) -> Result<T, String>
where
    T: std::str::FromStr + PartialEq + Default,
{
    let value: T = s
        .parse()
        .map_err(|_| format!("'{s}' is not a valid number"))?;
    if value == T::default() {
        return Err("value must be at least 1".to_string());
    }
    Ok(value)
}

/// Validate a cron expression without keeping the parsed schedule
fn parse_cron(s: &str) -> Result<String, String> {
    Scheduler::parse(s).map_err(|e| e.to_string())?;
    Ok(s.trim().to_string())
}

/// Extract Asana users and projects to JSON files
#[derive(Parser, Debug, Clone)]
#[command(name = "asana-extractor", version, about, long_about = None)]
pub struct Cli {
    /// Asana personal access token
    #[arg(long, env = "ASANA_TOKEN", hide_env_values = true)]
    pub token: String,

    /// Workspace GID to extract
    #[arg(long, env = "ASANA_WORKSPACE")]
    pub workspace: String,

    /// API base URL
    #[arg(long, env = "ASANA_BASE_URL", default_value = config::DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Directory receiving users/ and projects/
    #[arg(long, env = "OUTPUT_DIR", default_value = config::DEFAULT_OUTPUT_DIR)]
    pub output_dir: PathBuf,

    /// Request budget per minute, shared by all requests
    #[arg(long, env = "REQUESTS_PER_MINUTE", default_value_t = config::REQUESTS_PER_MINUTE, value_parser = parse_positive::<u32>)]
    pub requests_per_minute: u32,

    /// Maximum read requests in flight
    #[arg(long, env = "MAX_CONCURRENT_READ", default_value_t = config::MAX_CONCURRENT_READ, value_parser = parse_positive::<usize>)]
    pub max_concurrent_read: usize,

    /// Maximum write requests in flight
    #[arg(long, env = "MAX_CONCURRENT_WRITE", default_value_t = config::MAX_CONCURRENT_WRITE, value_parser = parse_positive::<usize>)]
    pub max_concurrent_write: usize,

    /// Timeout of one HTTP attempt (e.g. 30s)
    #[arg(long, env = "HTTP_TIMEOUT", default_value = "30s", value_parser = humantime::parse_duration)]
    pub http_timeout: Duration,

    /// Retries after the first attempt (range: 0-20)
    #[arg(long, env = "MAX_RETRIES", default_value_t = config::MAX_RETRIES, value_parser = clap::value_parser!(u32).range(0..=20))]
    pub max_retries: u32,

    /// Backoff before the first retry (e.g. 1s)
    #[arg(long, env = "INITIAL_BACKOFF", default_value = "1s", value_parser = humantime::parse_duration)]
    pub initial_backoff: Duration,

    /// Upper bound of any computed backoff (e.g. 60s)
    #[arg(long, env = "MAX_BACKOFF", default_value = "60s", value_parser = humantime::parse_duration)]
    pub max_backoff: Duration,

    /// Users per page (1-100)
    #[arg(long, env = "USER_PAGE_SIZE", default_value_t = config::USER_PAGE_SIZE, value_parser = parse_page_size)]
    pub user_page_size: usize,

    /// Projects per page (1-100)
    #[arg(long, env = "PROJECT_PAGE_SIZE", default_value_t = config::PROJECT_PAGE_SIZE, value_parser = parse_page_size)]
    pub project_page_size: usize,

    /// Cron expression of repeated runs, with optional leading seconds field
    #[arg(long, env = "SCHEDULE_CRON", default_value = config::DEFAULT_SCHEDULE_CRON, value_parser = parse_cron)]
    pub schedule_cron: String,

    /// Run a single extraction and exit instead of following the schedule
    #[arg(long, env = "RUN_ONCE")]
    pub once: bool,

    /// Serve Prometheus metrics on this address (e.g. 127.0.0.1:9000)
    #[arg(long, env = "METRICS_ADDR")]
    pub metrics_addr: Option<SocketAddr>,
}

impl Cli {
    /// Global rate and concurrency limits
    pub fn rate_budget(&self) -> RateBudget {
        RateBudget::new(
            self.requests_per_minute,
            self.max_concurrent_read,
            self.max_concurrent_write,
        )
    }

    /// Retry behaviour; the initial backoff may not exceed the maximum.
    pub fn retry_policy(&self) -> Result<RetryPolicy, CliError> {
        if self.initial_backoff > self.max_backoff {
            return Err(CliError::InvalidArgument(format!(
                "initial backoff {} exceeds max backoff {}",
                humantime::format_duration(self.initial_backoff),
                humantime::format_duration(self.max_backoff)
            )));
        }
        Ok(RetryPolicy::new(
            self.max_retries,
            self.initial_backoff,
            self.max_backoff,
        ))
    }

    /// Settings of the resilient client
    pub fn client_config(&self) -> Result<ClientConfig, CliError> {
        if self.token.trim().is_empty() {
            return Err(CliError::InvalidArgument("ASANA_TOKEN is empty".to_string()));
        }
        Ok(ClientConfig {
            token: self.token.clone(),
            rate_budget: self.rate_budget(),
            retry_policy: self.retry_policy()?,
            timeout: self.http_timeout,
        })
    }

    /// Wire client, Asana source and JSON storage into an extractor.
    pub fn build_extractor(&self) -> Result<Extractor, CliError> {
        let http = ResilientClient::new(self.client_config()?)?;
        let source = AsanaClient::new(Arc::new(http), &self.workspace, &self.base_url)
            .with_user_page_size(self.user_page_size)
            .with_project_page_size(self.project_page_size);
        let storage = JsonStorage::new(&self.output_dir)?;
        Ok(Extractor::new(Arc::new(source), Arc::new(storage)))
    }
}
