//! Error types for the Weaviate MCP server

use serde::Serialize;
use thiserror::Error;

/// Weaviate MCP error type
#[derive(Error, Debug)]
pub enum Error {
    /// Missing or malformed startup configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Backend unreachable or not ready
    #[error("Connection error: {0}")]
    Connection(String),

    /// Malformed tool arguments
    #[error("Validation error: {0}")]
    Validation(String),

    /// Collection not found
    #[error("Collection not found: {0}")]
    CollectionNotFound(String),

    /// Tenant not found in a multi-tenant collection
    #[error("Tenant not found: {tenant} (collection {collection})")]
    TenantNotFound { collection: String, tenant: String },

    /// Capability not present on the target collection
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// Embedding provider failure during vectorization
    #[error("Embedding provider error: {0}")]
    EmbeddingProvider(String),

    /// Deadline exceeded
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Dispatch to a tool that does not exist
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// Backend returned an error that fits no other category
    #[error("Backend error: {0}")]
    Backend(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Weaviate MCP operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error kind reported to tool callers.
///
/// Every [`Error`] projects onto exactly one kind; the dispatcher forwards the
/// kind unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    ConfigurationError,
    ConnectionError,
    ValidationError,
    NotFoundError,
    UnsupportedOperationError,
    EmbeddingProviderError,
    TimeoutError,
    UnknownToolError,
    BackendError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ConfigurationError => "ConfigurationError",
            ErrorKind::ConnectionError => "ConnectionError",
            ErrorKind::ValidationError => "ValidationError",
            ErrorKind::NotFoundError => "NotFoundError",
            ErrorKind::UnsupportedOperationError => "UnsupportedOperationError",
            ErrorKind::EmbeddingProviderError => "EmbeddingProviderError",
            ErrorKind::TimeoutError => "TimeoutError",
            ErrorKind::UnknownToolError => "UnknownToolError",
            ErrorKind::BackendError => "BackendError",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Error {
    /// Classify this error into the caller-facing taxonomy
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Configuration(_) => ErrorKind::ConfigurationError,
            Error::Connection(_) => ErrorKind::ConnectionError,
            Error::Validation(_) => ErrorKind::ValidationError,
            Error::CollectionNotFound(_) | Error::TenantNotFound { .. } => {
                ErrorKind::NotFoundError
            }
            Error::UnsupportedOperation(_) => ErrorKind::UnsupportedOperationError,
            Error::EmbeddingProvider(_) => ErrorKind::EmbeddingProviderError,
            Error::Timeout(_) => ErrorKind::TimeoutError,
            Error::UnknownTool(_) => ErrorKind::UnknownToolError,
            Error::Backend(_) | Error::Serialization(_) | Error::Io(_) => ErrorKind::BackendError,
        }
    }

    /// Build a timeout error for an operation bounded by `duration`
    pub fn timeout(operation: impl Into<String>, duration: std::time::Duration) -> Self {
        Error::Timeout(format!("{} exceeded {:?}", operation.into(), duration))
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Error::Timeout(err.to_string())
        } else if err.is_decode() {
            Error::Backend(format!("Malformed backend response: {}", err))
        } else {
            Error::Connection(err.to_string())
        }
    }
}
