//! Resilient JSON fetching.
//!
//! Every request runs under a per-attempt timeout. Rate-limited (429) and
//! timed-out attempts are retried on a fixed backoff schedule; every other
//! failure surfaces immediately as a typed [`FetchError`].

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, error, info, warn};

/// Machine-readable failure kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchErrorKind {
    Timeout,
    RateLimitExceeded,
    NotFound,
    ServerError,
    BadRequest,
    ApiError,
    NetworkError,
}

impl FetchErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FetchErrorKind::Timeout => "TIMEOUT",
            FetchErrorKind::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            FetchErrorKind::NotFound => "NOT_FOUND",
            FetchErrorKind::ServerError => "SERVER_ERROR",
            FetchErrorKind::BadRequest => "BAD_REQUEST",
            FetchErrorKind::ApiError => "API_ERROR",
            FetchErrorKind::NetworkError => "NETWORK_ERROR",
        }
    }

    /// Kinds that are retried locally before surfacing
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            FetchErrorKind::Timeout | FetchErrorKind::RateLimitExceeded
        )
    }
}

impl fmt::Display for FetchErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure surfaced to callers: a user-presentable message plus its kind
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct FetchError {
    pub kind: FetchErrorKind,
    pub message: String,
    /// HTTP status code, when the failure came from a response
    pub status_code: Option<u16>,
}

impl FetchError {
    pub fn new(kind: FetchErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status_code: None,
        }
    }

    pub fn timeout() -> Self {
        Self::new(
            FetchErrorKind::Timeout,
            "Request timed out. Please try again later.",
        )
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::NetworkError, message)
    }

    /// Classify a non-success HTTP status
    pub fn from_status(status: u16, reason: &str) -> Self {
        let (kind, message) = match status {
            429 => (
                FetchErrorKind::RateLimitExceeded,
                "Rate limit exceeded. Please try again later.".to_string(),
            ),
            404 => (
                FetchErrorKind::NotFound,
                "Resource not found: The requested data could not be found.".to_string(),
            ),
            500 => (
                FetchErrorKind::ServerError,
                "Server error: The API server encountered an error.".to_string(),
            ),
            400 => (
                FetchErrorKind::BadRequest,
                "Invalid request: Please check your search parameters.".to_string(),
            ),
            _ => (
                FetchErrorKind::ApiError,
                format!("API Error: {} {}", status, reason).trim_end().to_string(),
            ),
        };

        Self {
            kind,
            message,
            status_code: Some(status),
        }
    }

    /// Machine-readable status string
    pub fn status(&self) -> &'static str {
        self.kind.as_str()
    }

    pub fn is_transient(&self) -> bool {
        self.kind.is_transient()
    }
}

/// Transport overrides for a single request
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub method: Method,
    pub headers: Vec<(String, String)>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            method: Method::GET,
            headers: Vec::new(),
        }
    }
}

/// Raw response handed back by a transport
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub reason: String,
    pub body: Vec<u8>,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Transport-level failure (no HTTP response was obtained)
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,
    #[error("{0}")]
    Network(String),
}

/// Something that can perform a single HTTP exchange
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn execute(
        &self,
        url: &str,
        options: &RequestOptions,
    ) -> Result<TransportResponse, TransportError>;
}

/// Transport backed by a shared reqwest client
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(user_agent: &str) -> anyhow::Result<Self> {
        use anyhow::Context;

        let client = Client::builder()
            .user_agent(user_agent)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn execute(
        &self,
        url: &str,
        options: &RequestOptions,
    ) -> Result<TransportResponse, TransportError> {
        let mut request = self.client.request(options.method.clone(), url);
        for (name, value) in &options.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request.send().await.map_err(map_reqwest_error)?;
        let status = response.status();
        let body = response.bytes().await.map_err(map_reqwest_error)?;

        Ok(TransportResponse {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or_default().to_string(),
            body: body.to_vec(),
        })
    }
}

fn map_reqwest_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::Network(e.to_string())
    }
}

/// Timeout and retry schedule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Upper bound on a single attempt
    pub timeout: Duration,
    /// Wait before each retry; its length is the number of retries
    pub backoff: Vec<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            backoff: vec![
                Duration::from_millis(500),
                Duration::from_millis(1000),
                Duration::from_millis(2000),
            ],
        }
    }
}

impl RetryPolicy {
    pub fn max_attempts(&self) -> usize {
        self.backoff.len() + 1
    }
}

fn request_id() -> String {
    std::iter::repeat_with(fastrand::alphanumeric)
        .take(6)
        .collect::<String>()
        .to_lowercase()
}

/// JSON fetcher with timeout, retry and error classification
#[derive(Clone)]
pub struct ResilientFetcher {
    transport: Arc<dyn HttpTransport>,
    policy: RetryPolicy,
}

impl ResilientFetcher {
    pub fn new(transport: Arc<dyn HttpTransport>, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Fetch `url` and decode the body as JSON.
    ///
    /// Rate-limit and timeout retries draw from one shared attempt budget.
    pub async fn fetch_json(&self, url: &str, options: &RequestOptions) -> Result<Value, FetchError> {
        let request_id = request_id();
        let started = Instant::now();
        let max_attempts = self.policy.max_attempts();
        let mut attempt = 0;

        loop {
            debug!(
                request_id = %request_id,
                url = %url,
                attempt = attempt + 1,
                max_attempts = max_attempts,
                "Fetching"
            );

            let attempt_started = Instant::now();
            let result = match timeout(self.policy.timeout, self.transport.execute(url, options)).await {
                Ok(Ok(response)) => decode_response(response),
                Ok(Err(TransportError::Timeout)) | Err(_) => Err(FetchError::timeout()),
                Ok(Err(TransportError::Network(message))) => Err(FetchError::network(message)),
            };

            let attempt_ms = attempt_started.elapsed().as_millis() as u64;
            let duration_ms = started.elapsed().as_millis() as u64;
            debug!(
                request_id = %request_id,
                url = %url,
                attempt = attempt + 1,
                max_attempts = max_attempts,
                duration_ms = attempt_ms,
                ok = result.is_ok(),
                "Attempt finished"
            );

            match result {
                Ok(value) => {
                    info!(
                        request_id = %request_id,
                        url = %url,
                        attempts = attempt + 1,
                        duration_ms = attempt_ms,
                        total_ms = duration_ms,
                        "Request succeeded"
                    );
                    return Ok(value);
                }
                Err(err) if err.is_transient() && attempt < self.policy.backoff.len() => {
                    let delay = self.policy.backoff[attempt];
                    warn!(
                        request_id = %request_id,
                        url = %url,
                        attempt = attempt + 1,
                        status = err.status(),
                        duration_ms = attempt_ms,
                        delay_ms = delay.as_millis() as u64,
                        "Transient failure, retrying after delay"
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    error!(
                        request_id = %request_id,
                        url = %url,
                        attempts = attempt + 1,
                        status = err.status(),
                        duration_ms = attempt_ms,
                        total_ms = duration_ms,
                        error = %err,
                        "Request failed"
                    );
                    return Err(err);
                }
            }
        }
    }

    /// Fetch with default options and decode into `T`
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, FetchError> {
        let value = self.fetch_json(url, &RequestOptions::default()).await?;
        serde_json::from_value(value)
            .map_err(|e| FetchError::network(format!("Failed to parse response: {}", e)))
    }
}

fn decode_response(response: TransportResponse) -> Result<Value, FetchError> {
    if response.is_success() {
        return serde_json::from_slice(&response.body)
            .map_err(|e| FetchError::network(format!("Failed to parse response: {}", e)));
    }

    Err(FetchError::from_status(response.status, &response.reason))
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use reqwest::StatusCode;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// One scripted transport outcome
    #[derive(Debug, Clone)]
    pub enum Step {
        Respond(u16, String),
        /// Respond after the delay
        Slow(Duration, u16, String),
        Hang,
        Fail(String),
    }

    /// Transport that replays a script and records every requested URL
    #[derive(Default)]
    pub struct ScriptedTransport {
        steps: Mutex<VecDeque<Step>>,
        repeat: Mutex<Option<Step>>,
        calls: AtomicUsize,
        urls: Mutex<Vec<String>>,
    }

    impl ScriptedTransport {
        pub fn new(steps: Vec<Step>) -> Arc<Self> {
            Arc::new(Self {
                steps: Mutex::new(steps.into()),
                ..Default::default()
            })
        }

        /// Always answer with `step` once the script runs out
        pub fn repeating(step: Step) -> Arc<Self> {
            let transport = Self::default();
            *transport.repeat.lock().unwrap() = Some(step);
            Arc::new(transport)
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        pub fn urls(&self) -> Vec<String> {
            self.urls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl HttpTransport for ScriptedTransport {
        async fn execute(
            &self,
            url: &str,
            _options: &RequestOptions,
        ) -> Result<TransportResponse, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.urls.lock().unwrap().push(url.to_string());

            let step = self
                .steps
                .lock()
                .unwrap()
                .pop_front()
                .or_else(|| self.repeat.lock().unwrap().clone())
                .unwrap_or(Step::Fail("script exhausted".to_string()));

            let (status, body) = match step {
                Step::Respond(status, body) => (status, body),
                Step::Slow(delay, status, body) => {
                    tokio::time::sleep(delay).await;
                    (status, body)
                }
                Step::Hang => {
                    std::future::pending::<()>().await;
                    return Err(TransportError::Timeout);
                }
                Step::Fail(message) => return Err(TransportError::Network(message)),
            };

            Ok(TransportResponse {
                status,
                reason: StatusCode::from_u16(status)
                    .ok()
                    .and_then(|s| s.canonical_reason())
                    .unwrap_or_default()
                    .to_string(),
                body: body.into_bytes(),
            })
        }
    }
}
