use serde::Serialize;
use thiserror::Error;

/// Failures talking to the remote catalog API.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("catalog returned HTTP {code} for {url}")]
    Status {
        code: u16,
        url: String,
        body: Option<String>,
    },

    #[error("failed to reach catalog at {url}: {message}")]
    Unreachable { url: String, message: String },

    #[error("unexpected catalog failure: {message}")]
    Unexpected { message: String },
}

impl RemoteError {
    pub(crate) fn from_transport(url: &str, err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() || err.is_request() || err.is_body() {
            RemoteError::Unreachable {
                url: url.to_string(),
                message: err.to_string(),
            }
        } else {
            RemoteError::Unexpected {
                message: err.to_string(),
            }
        }
    }
}

/// Failures against the local SQLite cache.
#[derive(Debug, Error)]
pub enum LocalStoreError {
    #[error("local store query failed: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("local store worker did not finish: {0}")]
    Worker(String),

    #[error("failed to encode column value: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },

    #[error("local database not found at {0}")]
    MissingDatabase(String),

    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),
}

/// The `{error, details}` object returned to tool callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolError {
    pub error: String,
    pub details: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_text: Option<String>,
}

impl ToolError {
    pub fn new(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: details.into(),
            response_text: None,
        }
    }

    pub fn invalid_argument(details: impl Into<String>) -> Self {
        Self::new("Invalid argument", details)
    }
}

impl From<RemoteError> for ToolError {
    fn from(err: RemoteError) -> Self {
        let details = err.to_string();
        match err {
            RemoteError::Status { code, body, .. } => ToolError {
                error: format!("API Error: {}", code),
                details,
                response_text: body,
            },
            RemoteError::Unreachable { .. } => ToolError::new(
                "Request Error: Failed to connect to catalog API.",
                details,
            ),
            RemoteError::Unexpected { .. } => ToolError::new(
                "An unexpected error occurred during API call.",
                details,
            ),
        }
    }
}
