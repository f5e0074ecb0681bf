//! Error type definitions for the M3U sync core
//!
//! This module defines all error types used throughout the crate, providing a
//! hierarchical error system that separates source-content defects, transport
//! failures and persistence failures.

use thiserror::Error;

/// Top-level application error type
///
/// This enum represents all possible errors that can occur while ingesting
/// and synchronizing playlists. It uses `thiserror` to provide automatic error
/// trait implementations and proper error chaining.
#[derive(Error, Debug)]
pub enum AppError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Repository layer errors
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// Transport errors while fetching a playlist
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    /// Playlist format errors
    #[error("Format error: {0}")]
    Format(#[from] FormatError),

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Operation already in progress errors
    #[error("Operation already in progress: {operation_type} on {resource}")]
    OperationInProgress {
        operation_type: String,
        resource: String,
    },

    /// A scheduled retry was requested before its backoff expired
    #[error("Retry backoff active for {resource} until {retry_after}")]
    BackingOff {
        resource: String,
        retry_after: chrono::DateTime<chrono::Utc>,
    },

    /// The operation observed a cancellation request
    #[error("Sync cancelled: {resource}")]
    Cancelled { resource: String },

    /// Local I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Playlist format errors. These are defects in the source content or the
/// subscription configuration and are never retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    /// URL path does not name a recognized playlist format
    #[error("Unsupported url: {url}")]
    UnsupportedUrl { url: String },

    /// An attribute fragment could not be resolved to a title
    #[error("Illegal m3u content: {line}")]
    UnresolvableTitle { line: String },
}

/// Repository layer specific errors
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// SQL query execution failures
    #[error("Query failed: {query} - {message}")]
    QueryFailed { query: String, message: String },

    /// Migration failures
    #[error("Migration failed: {version} - {message}")]
    MigrationFailed { version: String, message: String },

    /// Stored timestamp could not be decoded
    #[error("Invalid timestamp: {value}")]
    InvalidTimestamp { value: String },
}

/// Transport errors raised while fetching playlist content
#[derive(Error, Debug)]
pub enum SourceError {
    /// Network timeouts
    #[error("Connection timeout: {url}")]
    Timeout { url: String },

    /// Non-success HTTP responses
    #[error("HTTP error: {status} - {message}")]
    Http { status: u16, message: String },

    /// DNS, TLS, connection reset and other transport level failures
    #[error("Connection failed: {url} - {message}")]
    Connection { url: String, message: String },

    /// Response body exceeded the configured limit
    #[error("Playlist too large: more than {max_bytes} bytes from {url}")]
    TooLarge { url: String, max_bytes: u64 },

    /// The URL could not be parsed or uses an unsupported scheme
    #[error("Invalid url: {url} - {message}")]
    InvalidUrl { url: String, message: String },
}

/// Coarse error classification used by the synchronizer and the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Source-content or configuration defect, not retried
    Format,
    /// Network failure, the user may retry
    Transport,
    /// Storage failure, previously stored data is preserved
    Persistence,
    /// Another operation holds the resource
    Conflict,
    /// The caller cancelled the operation
    Cancelled,
    Internal,
}

/// Convenience methods for creating common error types
impl AppError {
    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an operation in progress error
    pub fn operation_in_progress<O: Into<String>, R: Into<String>>(
        operation_type: O,
        resource: R,
    ) -> Self {
        Self::OperationInProgress {
            operation_type: operation_type.into(),
            resource: resource.into(),
        }
    }

    /// Create a cancellation error
    pub fn cancelled<R: Into<String>>(resource: R) -> Self {
        Self::Cancelled {
            resource: resource.into(),
        }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Format(_) | Self::Configuration { .. } => ErrorKind::Format,
            Self::Source(SourceError::TooLarge { .. } | SourceError::InvalidUrl { .. }) => {
                ErrorKind::Format
            }
            Self::Source(_) => ErrorKind::Transport,
            Self::Database(_) | Self::Repository(_) => ErrorKind::Persistence,
            Self::OperationInProgress { .. } | Self::BackingOff { .. } => ErrorKind::Conflict,
            Self::Cancelled { .. } => ErrorKind::Cancelled,
            Self::Io(_) | Self::Internal { .. } => ErrorKind::Internal,
        }
    }

    /// Whether retrying the same operation later could succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Transport | ErrorKind::Persistence | ErrorKind::Conflict
        )
    }
}

impl RepositoryError {
    /// Create a query failed error
    pub fn query_failed<Q: Into<String>, M: Into<String>>(query: Q, message: M) -> Self {
        Self::QueryFailed {
            query: query.into(),
            message: message.into(),
        }
    }
}

impl SourceError {
    /// Create a timeout error
    pub fn timeout<U: Into<String>>(url: U) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Create a connection error
    pub fn connection<U: Into<String>, M: Into<String>>(url: U, message: M) -> Self {
        Self::Connection {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Create an invalid url error
    pub fn invalid_url<U: Into<String>, M: Into<String>>(url: U, message: M) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let unsupported = AppError::from(FormatError::UnsupportedUrl {
            url: "http://example.com/list.txt".to_string(),
        });
        assert_eq!(unsupported.kind(), ErrorKind::Format);
        assert!(!unsupported.is_retryable());
        assert_eq!(
            unsupported.to_string(),
            "Format error: Unsupported url: http://example.com/list.txt"
        );

        let timeout = AppError::from(SourceError::timeout("http://example.com/a.m3u"));
        assert_eq!(timeout.kind(), ErrorKind::Transport);
        assert!(timeout.is_retryable());

        let persistence = AppError::from(RepositoryError::query_failed("DELETE", "locked"));
        assert_eq!(persistence.kind(), ErrorKind::Persistence);

        let cancelled = AppError::cancelled("http://example.com/a.m3u");
        assert_eq!(cancelled.kind(), ErrorKind::Cancelled);
        assert!(!cancelled.is_retryable());
    }
}
