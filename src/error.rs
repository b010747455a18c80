use std::path::PathBuf;

use chrono::NaiveDate;

/// Errors raised by the export core. Every variant is fatal to the run;
/// retryable conditions are absorbed by the HTTP and API layers before they
/// surface here.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("storage error at {}: {source}", path.display())]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("HTTP {status} from {context}: {body}")]
    HttpStatus {
        status: u16,
        context: String,
        body: String,
    },

    #[error("cannot read authorization code: {0}")]
    Prompt(#[source] std::io::Error),

    #[error("OAuth protocol error: {0}")]
    Protocol(String),

    #[error("diary traversal error: {0}")]
    Traversal(String),

    #[error("API error: method={method}, code={code}: {message}")]
    Api {
        method: String,
        code: i64,
        message: String,
    },

    #[error("API rate limit still exceeded after {retries} retries: method={method}")]
    RateLimited { method: String, retries: u32 },

    #[error("cannot parse field '{field}' from {value:?}: {reason}")]
    Parse {
        field: &'static str,
        value: String,
        reason: String,
    },

    #[error("invalid date range: {from} is after {to}")]
    InvalidRange { from: NaiveDate, to: NaiveDate },

    #[error("invalid response body: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ExportError>;

impl From<reqwest::Error> for ExportError {
    fn from(err: reqwest::Error) -> Self {
        ExportError::Transport(err.to_string())
    }
}
