use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::error::Result;

/// Status codes worth another attempt.
pub const RETRY_STATUSES: &[u16] = &[429, 500, 501, 502, 503, 504];

pub type FormParams = Vec<(String, String)>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

/// A single request attempt. Connection-level failures are errors; any
/// status code is a response.
pub trait Transport: Send + Sync {
    fn send(&self, method: &str, url: &str, form: &[(String, String)]) -> Result<HttpResponse>;
}

pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration);
}

pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

pub struct ReqwestTransport {
    client: reqwest::blocking::Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

impl Transport for ReqwestTransport {
    fn send(&self, method: &str, url: &str, form: &[(String, String)]) -> Result<HttpResponse> {
        let method = reqwest::Method::from_bytes(method.as_bytes())
            .map_err(|e| crate::error::ExportError::Transport(e.to_string()))?;

        let mut request = self.client.request(method, url);
        if !form.is_empty() {
            request = request.form(form);
        }

        let response = request.send()?;
        let status = response.status().as_u16();
        let body = response.text()?;
        Ok(HttpResponse { status, body })
    }
}

/// Exponential backoff: `initial_backoff * 2^retry_number`, capped at
/// `max_backoff`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    pub fn transport_default() -> Self {
        Self {
            max_retries: 5,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(60),
        }
    }

    pub fn rate_limit_default() -> Self {
        Self {
            max_retries: 5,
            initial_backoff: Duration::from_secs(10),
            max_backoff: Duration::from_secs(300),
        }
    }

    pub fn backoff(&self, retry_number: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry_number);
        self.initial_backoff
            .checked_mul(factor)
            .map_or(self.max_backoff, |d| d.min(self.max_backoff))
    }
}

/// Sends form requests, retrying retryable statuses with backoff. Once the
/// budget is spent the last response is returned as-is; interpreting the
/// status is the caller's job.
pub struct ResilientClient {
    transport: Arc<dyn Transport>,
    sleeper: Arc<dyn Sleeper>,
    policy: RetryPolicy,
}

impl ResilientClient {
    pub fn new(transport: Arc<dyn Transport>, sleeper: Arc<dyn Sleeper>, policy: RetryPolicy) -> Self {
        Self {
            transport,
            sleeper,
            policy,
        }
    }

    pub fn sleeper(&self) -> Arc<dyn Sleeper> {
        Arc::clone(&self.sleeper)
    }

    pub fn send(&self, method: &str, url: &str, form: &[(String, String)]) -> Result<HttpResponse> {
        let mut retry_number = 0;
        loop {
            let response = self.transport.send(method, url, form)?;

            if !RETRY_STATUSES.contains(&response.status) || retry_number >= self.policy.max_retries {
                return Ok(response);
            }

            let wait = self.policy.backoff(retry_number);
            retry_number += 1;
            warn!(
                "Retry HTTP request because of status {}, retry {}/{}, wait {:?}",
                response.status, retry_number, self.policy.max_retries, wait
            );
            self.sleeper.sleep(wait);
        }
    }
}
