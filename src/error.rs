//! Error types for fetch-pipeline
//!
//! Only misuse of the pipeline's entry contract and infrastructure failures
//! (sink I/O, client construction, task panics) surface as errors. A failed
//! fetch is never an error: it is recorded as data with `status_code: 0`.

use thiserror::Error;

/// Result type alias for fetch-pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for fetch-pipeline
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "workers")
        key: Option<String>,
    },

    /// A target the fetcher cannot service was handed to the pipeline
    #[error("unsupported target '{target}': {reason}")]
    UnsupportedTarget {
        /// The offending target as supplied by the caller
        target: String,
        /// Why the fetcher rejected it
        reason: String,
    },

    /// Queue bookkeeping was misused
    #[error("queue error: {0}")]
    Queue(#[from] QueueError),

    /// I/O error (output sink creation or append)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP client could not be constructed
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A worker or writer task panicked or was aborted
    #[error("task failed: {0}")]
    TaskFailed(String),
}

/// Errors raised by [`TaskQueue`](crate::queue::TaskQueue) bookkeeping
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    /// `mark_done()` was called more times than items were put
    #[error("mark_done() called more times than items were put")]
    TooManyDone,

    /// The queue was closed during shutdown
    #[error("queue is closed")]
    Closed,
}

impl From<tokio::task::JoinError> for Error {
    fn from(err: tokio::task::JoinError) -> Self {
        if err.is_panic() {
            Error::TaskFailed(format!("task panicked: {}", err))
        } else {
            Error::TaskFailed(format!("task aborted: {}", err))
        }
    }
}

impl Error {
    /// Shorthand for a [`Error::Config`] tied to a specific key
    pub(crate) fn config(key: &str, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.to_string()),
        }
    }
}
