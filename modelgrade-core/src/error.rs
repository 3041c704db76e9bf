//! Error types for the modelgrade core library.
//!
//! Uses `thiserror` for public API error types. Metric-internal failures never
//! cross the evaluator boundary; they are converted to neutral results by
//! [`crate::registry::measure`].

use std::path::PathBuf;

/// Top-level error type for the modelgrade core library.
#[derive(Debug, thiserror::Error)]
pub enum ModelgradeError {
    #[error("Metric error: {0}")]
    Metric(#[from] MetricError),

    #[error("Client error: {0}")]
    Client(#[from] ClientError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("URL error: {0}")]
    Url(#[from] UrlError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors raised inside a metric's scoring routine.
#[derive(Debug, thiserror::Error)]
pub enum MetricError {
    #[error("Upstream request failed: {0}")]
    Upstream(#[from] ClientError),

    #[error("Not a recognized model URL: {url}")]
    NotAModel { url: String },

    #[error("Missing input for metric '{metric}': {what}")]
    MissingInput { metric: String, what: String },

    #[error("Unexpected response shape: {message}")]
    Malformed { message: String },
}

/// Errors from the hub, source-host, and LLM HTTP clients.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Request to {url} failed: {message}")]
    Request { url: String, message: String },

    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("Authentication rejected by {service}")]
    AuthFailed { service: String },

    #[error("Request to {url} timed out")]
    Timeout { url: String },

    #[error("Failed to parse response from {url}: {message}")]
    ResponseParse { url: String, message: String },

    #[error("Missing credential: {var}")]
    MissingCredential { var: String },
}

impl ClientError {
    /// Classify a transport-level reqwest error for the given URL.
    pub fn from_reqwest(url: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ClientError::Timeout {
                url: url.to_string(),
            }
        } else {
            ClientError::Request {
                url: url.to_string(),
                message: err.to_string(),
            }
        }
    }

    /// Whether the upstream answered 404.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::Status { status: 404, .. })
    }
}

/// Errors from the artifact and lineage store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Artifact not found: {id}")]
    NotFound { id: String },

    #[error("Artifact already exists: {kind} {url}")]
    Duplicate { kind: String, url: String },

    #[error("Invalid artifact: {message}")]
    Invalid { message: String },

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Store task failed: {message}")]
    Task { message: String },
}

/// Errors from the configuration system.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {}", path.display())]
    FileNotFound { path: PathBuf },

    #[error("Configuration parse error: {message}")]
    ParseError { message: String },
}

/// Errors from URL validation.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum UrlError {
    #[error("URL is empty")]
    Empty,

    #[error("URL exceeds {max} characters")]
    TooLong { max: usize },

    #[error("Unsupported scheme: {scheme}")]
    Scheme { scheme: String },

    #[error("Host not allowed: {host}")]
    HostNotAllowed { host: String },

    #[error("Private or loopback address not allowed: {host}")]
    PrivateAddress { host: String },

    #[error("Malformed URL: {message}")]
    Malformed { message: String },
}

/// Result type alias for modelgrade operations.
pub type Result<T> = std::result::Result<T, ModelgradeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ModelgradeError::Store(StoreError::Duplicate {
            kind: "model".into(),
            url: "https://huggingface.co/gpt2".into(),
        });
        assert_eq!(
            err.to_string(),
            "Store error: Artifact already exists: model https://huggingface.co/gpt2"
        );
    }

    #[test]
    fn test_client_error_not_found() {
        let err = ClientError::Status {
            url: "https://huggingface.co/api/models/x".into(),
            status: 404,
        };
        assert!(err.is_not_found());
        let other = ClientError::Status {
            url: "u".into(),
            status: 500,
        };
        assert!(!other.is_not_found());
    }

    #[test]
    fn test_metric_error_from_client() {
        let err: MetricError = ClientError::AuthFailed {
            service: "github".into(),
        }
        .into();
        assert!(err.to_string().contains("github"));
    }

    #[test]
    fn test_url_error_display() {
        assert_eq!(
            UrlError::TooLong { max: 2048 }.to_string(),
            "URL exceeds 2048 characters"
        );
    }
}
