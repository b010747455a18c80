use std::sync::Arc;

use serde_json::Value;
use tracing::warn;

use crate::auth::OAuthSession;
use crate::error::{ExportError, Result};
use crate::http::{RetryPolicy, Sleeper};

pub const API_URL: &str = "https://platform.fatsecret.com/rest/server.api";

/// Substring of the error message returned when the per-user rate limit trips.
pub const RATE_LIMIT_MESSAGE: &str = "User is performing too many actions";

/// A JSON method call against the diary API.
pub trait ApiClient {
    fn call(&mut self, method: &str, params: &[(&str, String)]) -> Result<Value>;
}

/// OAuth1-signed client for the FatSecret REST endpoint.
///
/// Application-level rate-limit errors arrive inside 200 responses and get
/// their own, slower retry budget on top of the transport retries.
pub struct FatSecretClient {
    session: OAuthSession,
    url: String,
    rate_limit: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl FatSecretClient {
    pub fn new(session: OAuthSession, rate_limit: RetryPolicy) -> Self {
        let sleeper = session.sleeper();
        Self {
            session,
            url: API_URL.to_string(),
            rate_limit,
            sleeper,
        }
    }

    fn call_once(&self, method: &str, params: &[(&str, String)]) -> Result<Value> {
        let mut form = vec![
            ("method".to_string(), method.to_string()),
            ("format".to_string(), "json".to_string()),
        ];
        form.extend(params.iter().map(|(k, v)| (k.to_string(), v.clone())));

        let response = self.session.send_signed("POST", &self.url, form)?;
        if response.status > 201 {
            return Err(ExportError::HttpStatus {
                status: response.status,
                context: format!("API method {}", method),
                body: response.body,
            });
        }

        let body: Value = serde_json::from_str(&response.body)?;
        if let Some(err) = body.get("error").filter(|e| e.is_object()) {
            return Err(ExportError::Api {
                method: method.to_string(),
                code: err.get("code").and_then(Value::as_i64).unwrap_or_default(),
                message: err
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            });
        }

        Ok(body)
    }
}

fn is_rate_limit(err: &ExportError) -> bool {
    matches!(err, ExportError::Api { message, .. } if message.contains(RATE_LIMIT_MESSAGE))
}

impl ApiClient for FatSecretClient {
    fn call(&mut self, method: &str, params: &[(&str, String)]) -> Result<Value> {
        let mut retry_number = 0;
        loop {
            match self.call_once(method, params) {
                Err(err) if is_rate_limit(&err) => {
                    if retry_number >= self.rate_limit.max_retries {
                        return Err(ExportError::RateLimited {
                            method: method.to_string(),
                            retries: retry_number,
                        });
                    }

                    let wait = self.rate_limit.backoff(retry_number);
                    retry_number += 1;
                    warn!(
                        "API rate limit hit on {}, retry {}/{} after {:?}",
                        method, retry_number, self.rate_limit.max_retries, wait
                    );
                    self.sleeper.sleep(wait);
                }
                other => return other,
            }
        }
    }
}
