//! Network-free fakes for the transport and sleep seams.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use super::client::{HttpResponse, Sleeper, Transport};
use crate::error::{ExportError, Result};

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub url: String,
    pub form: Vec<(String, String)>,
}

impl RecordedRequest {
    pub fn param(&self, name: &str) -> Option<&str> {
        self.form
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Replays queued responses in order. With a fallback set, it keeps
/// returning that response once the queue is empty; otherwise an empty queue
/// behaves like a refused connection.
#[derive(Default)]
pub struct ScriptedTransport {
    queue: Mutex<VecDeque<HttpResponse>>,
    fallback: Option<HttpResponse>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn repeating(status: u16, body: &str) -> Self {
        Self {
            fallback: Some(HttpResponse {
                status,
                body: body.to_string(),
            }),
            ..Self::default()
        }
    }

    pub fn push(&self, status: u16, body: &str) {
        self.queue.lock().unwrap().push_back(HttpResponse {
            status,
            body: body.to_string(),
        });
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Transport for ScriptedTransport {
    fn send(&self, method: &str, url: &str, form: &[(String, String)]) -> Result<HttpResponse> {
        self.requests.lock().unwrap().push(RecordedRequest {
            method: method.to_string(),
            url: url.to_string(),
            form: form.to_vec(),
        });

        let next = self.queue.lock().unwrap().pop_front();
        next.or_else(|| self.fallback.clone())
            .ok_or_else(|| ExportError::Transport("connection refused".to_string()))
    }
}

#[derive(Default)]
pub struct RecordingSleeper {
    slept: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn slept(&self) -> Vec<Duration> {
        self.slept.lock().unwrap().clone()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        self.slept.lock().unwrap().push(duration);
    }
}
