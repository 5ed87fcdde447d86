//! Error types for hedge-core

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Result type alias for run-level operations
pub type Result<T> = std::result::Result<T, Error>;

/// Run-level errors
///
/// These are the only conditions that abort a run. Everything that goes
/// wrong for an individual symbol is reported as a [`crate::Failure`] instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Portfolio is empty or contains duplicates
    #[error("Invalid portfolio: {0}")]
    InvalidPortfolio(String),

    /// A symbol could not be normalized
    #[error("Invalid symbol: {0}")]
    InvalidSymbol(String),

    /// Pipeline configuration is out of range
    #[error("Configuration error: {0}")]
    InvalidConfig(String),

    /// The worker pool could not be created
    #[error("Worker pool initialization failed: {0}")]
    PoolInitialization(String),
}

/// Classification of a failed agent attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ErrorKind {
    /// No response within the allotted time
    Timeout,
    /// The collaborator signaled throttling
    RateLimited,
    /// Generic recoverable failure
    Transient,
    /// Symbol or task rejected by the collaborator
    InvalidInput,
    /// Run-level cancellation reached this symbol
    Cancelled,
    /// Unclassified failure
    Unknown,
}

impl ErrorKind {
    /// Kinds retried when no explicit retryable set is configured
    pub const DEFAULT_RETRYABLE: [ErrorKind; 3] =
        [ErrorKind::Timeout, ErrorKind::RateLimited, ErrorKind::Transient];

    /// Whether this kind may ever be retried.
    ///
    /// `InvalidInput` and `Cancelled` are terminal no matter what a retry
    /// policy says.
    pub fn is_retry_eligible(self) -> bool {
        !matches!(self, ErrorKind::InvalidInput | ErrorKind::Cancelled)
    }

    /// Stable name used in logs and serialized reports
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Timeout => "Timeout",
            ErrorKind::RateLimited => "RateLimited",
            ErrorKind::Transient => "Transient",
            ErrorKind::InvalidInput => "InvalidInput",
            ErrorKind::Cancelled => "Cancelled",
            ErrorKind::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned by a single agent attempt
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct AgentError {
    /// What went wrong
    pub kind: ErrorKind,
    /// Underlying message from the collaborator
    pub message: String,
}

impl AgentError {
    /// Create an error of the given kind
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RateLimited, message)
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transient, message)
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidInput, message)
    }

    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Cancelled, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unknown, message)
    }
}
