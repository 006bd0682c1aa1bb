//! Resilient HTTP client
//!
//! Wraps a shared `reqwest::Client` with:
//! - admission control ([`limiter::AdmissionLimiter`]) before any network activity
//! - bounded retry with backoff ([`retry::execute`]) around each logical request
//! - bearer credential and `Accept` headers on every attempt

use bytes::Bytes;
use reqwest::header::{HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::{Client, Method, Response, StatusCode};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::cancel::Cancellation;
use crate::config::HTTP_CONNECT_TIMEOUT_SECS;

pub mod backoff;
pub mod limiter;
pub mod outcome;
pub mod retry;

pub use limiter::{AdmissionGuard, AdmissionLimiter, LimiterError, RateBudget, RequestClass};
pub use outcome::{AttemptOutcome, RetryReason};
pub use retry::{RetryError, RetryPolicy};

const ACCEPT_JSON: &str = "application/json";

/// Client errors
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Cancellation fired while waiting for admission, during an attempt or
    /// while reading the body
    #[error("request cancelled")]
    Cancelled,

    /// Limiter could not be built
    #[error("rate limiter error: {0}")]
    Limiter(LimiterError),

    /// Retries exhausted on transport errors or retryable statuses
    #[error(transparent)]
    RetriesExhausted(RetryError<reqwest::Error>),

    /// Terminal non-success status
    #[error("unexpected status code {}: {body}", .status.as_u16())]
    UnexpectedStatus {
        /// Response status
        status: StatusCode,
        /// Response body, for diagnostics
        body: String,
    },

    /// Body could not be read after a successful status
    #[error("failed to read response body: {0}")]
    Body(#[source] reqwest::Error),

    /// Underlying HTTP client could not be built
    #[error("failed to build HTTP client: {0}")]
    Build(#[source] reqwest::Error),

    /// Token contains characters not allowed in a header
    #[error("invalid credential: {0}")]
    InvalidCredential(String),
}

impl ClientError {
    /// Whether the error stems from cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl From<LimiterError> for ClientError {
    fn from(err: LimiterError) -> Self {
        match err {
            LimiterError::Cancelled => Self::Cancelled,
            other => Self::Limiter(other),
        }
    }
}

impl From<RetryError<reqwest::Error>> for ClientError {
    fn from(err: RetryError<reqwest::Error>) -> Self {
        match err {
            RetryError::Cancelled => Self::Cancelled,
            other => Self::RetriesExhausted(other),
        }
    }
}

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;

/// Settings for [`ResilientClient::new`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Bearer token
    pub token: String,
    /// Global rate and concurrency limits
    pub rate_budget: RateBudget,
    /// Retry behaviour
    pub retry_policy: RetryPolicy,
    /// Overall timeout of one HTTP attempt
    pub timeout: Duration,
}

/// Build the process-wide HTTP client with connect and request timeouts.
pub fn build_http_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .connect_timeout(Duration::from_secs(HTTP_CONNECT_TIMEOUT_SECS))
        .timeout(timeout)
        .build()
}

/// HTTP client that admits, authenticates and retries every request.
#[derive(Debug, Clone)]
pub struct ResilientClient {
    http: Arc<Client>,
    limiter: Arc<AdmissionLimiter>,
    retry_policy: RetryPolicy,
    authorization: HeaderValue,
}

impl ResilientClient {
    /// Build a client with its own HTTP connection pool and limiter.
    pub fn new(config: ClientConfig) -> ClientResult<Self> {
        let http = build_http_client(config.timeout).map_err(ClientError::Build)?;
        let limiter = AdmissionLimiter::new(config.rate_budget)?;
        Self::from_parts(Arc::new(http), Arc::new(limiter), config.retry_policy, &config.token)
    }

    /// Assemble a client from shared parts.
    ///
    /// Clients built from the same limiter share its rate and concurrency budget.
    pub fn from_parts(
        http: Arc<Client>,
        limiter: Arc<AdmissionLimiter>,
        retry_policy: RetryPolicy,
        token: &str,
    ) -> ClientResult<Self> {
        let mut authorization = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|e| ClientError::InvalidCredential(e.to_string()))?;
        authorization.set_sensitive(true);

        Ok(Self {
            http,
            limiter,
            retry_policy,
            authorization,
        })
    }

    /// The limiter shared by this client.
    pub fn limiter(&self) -> &Arc<AdmissionLimiter> {
        &self.limiter
    }

    /// The retry policy applied to every request.
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    /// Send one logical request and return the terminal response.
    ///
    /// The admission slot is held for the whole retry sequence and released
    /// when this call returns, whatever the outcome.
    pub async fn send(&self, method: Method, url: &Url, cancel: &Cancellation) -> ClientResult<Response> {
        let _admission = self
            .limiter
            .admit(RequestClass::from_method(&method), cancel)
            .await?;
        self.dispatch(method, url, cancel).await
    }

    /// GET `url` and return the raw payload of a 200 response.
    ///
    /// # Errors
    /// - [`ClientError::UnexpectedStatus`] with the body for any other terminal status
    /// - [`ClientError::RetriesExhausted`] when retries run out
    /// - [`ClientError::Cancelled`] if `cancel` fires while waiting, sending or
    ///   reading the body
    pub async fn fetch_body(&self, url: &Url, cancel: &Cancellation) -> ClientResult<Bytes> {
        let _admission = self.limiter.admit(RequestClass::Read, cancel).await?;
        let response = self.dispatch(Method::GET, url, cancel).await?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = read_body(response.text(), cancel).await?.unwrap_or_default();
            return Err(ClientError::UnexpectedStatus { status, body });
        }

        let payload = read_body(response.bytes(), cancel).await?.map_err(ClientError::Body)?;
        debug!(url = %url, bytes = payload.len(), "fetched body");
        Ok(payload)
    }

    async fn dispatch(&self, method: Method, url: &Url, cancel: &Cancellation) -> ClientResult<Response> {
        let response = retry::execute(&self.retry_policy, cancel, |_attempt| {
            // Fresh request per attempt: nothing from a previous attempt carries over.
            self.http
                .request(method.clone(), url.clone())
                .header(AUTHORIZATION, self.authorization.clone())
                .header(ACCEPT, ACCEPT_JSON)
                .send()
        })
        .await?;
        Ok(response)
    }
}

/// Drain a response body unless `cancel` fires first.
async fn read_body<T>(
    body: impl Future<Output = reqwest::Result<T>>,
    cancel: &Cancellation,
) -> ClientResult<reqwest::Result<T>> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ClientError::Cancelled),
        result = body => Ok(result),
    }
}
