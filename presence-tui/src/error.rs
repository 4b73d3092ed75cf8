//! Error types shared across the fetch, normalize and render stages.

use thiserror::Error;

/// Rejected user input. Raised before any request is issued.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Please enter both Guild ID and User ID")]
    MissingId,

    #[error("Guild ID and User ID must be numeric")]
    NonNumericId,

    #[error("Invalid date '{0}'. Use YYYY-MM-DD")]
    InvalidDate(String),

    #[error("Invalid axis bound '{0}'. Use YYYY-MM-DD HH:MM:SS")]
    InvalidAxisBound(String),

    #[error("Axis minimum must be before axis maximum")]
    EmptyAxisWindow,
}

/// Failure of a single status-changes request.
///
/// Carries plain strings so it can cross the worker channel and be shown
/// verbatim in the failed view.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("API responded with status: {status}")]
    Status { status: u16, body: String },

    #[error("Request failed: {0}")]
    Transport(String),

    #[error("Malformed response body: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => FetchError::Status {
                status: status.as_u16(),
                body: String::new(),
            },
            None => FetchError::Transport(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        FetchError::Decode(err.to_string())
    }
}

/// Misuse of the chart surface lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ChartError {
    #[error("chart has already been disposed")]
    Disposed,

    #[error("chart is already mounted")]
    AlreadyMounted,
}

/// Problems reading the config file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}
