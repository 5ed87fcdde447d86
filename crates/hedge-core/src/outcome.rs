//! Per-symbol outcomes recorded by a run

use crate::error::{AgentError, ErrorKind};
use crate::symbol::Symbol;
use serde::{Deserialize, Serialize};

/// A successful analysis of one symbol
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentResult {
    pub symbol: Symbol,
    /// Agent payload, `None` when the agent produced nothing
    pub payload: Option<String>,
    /// Attempts made, including the successful one
    pub attempts: u32,
    /// Completion order within the run, for tie-breaking and observability only
    pub sequence: u64,
}

/// Terminal failure of one symbol after retries were exhausted or skipped
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    pub symbol: Symbol,
    pub kind: ErrorKind,
    /// Attempts made; zero when the symbol never started
    pub attempts: u32,
    /// Last underlying error message
    pub message: String,
}

impl Failure {
    pub fn new(symbol: Symbol, kind: ErrorKind, attempts: u32, message: impl Into<String>) -> Self {
        Self {
            symbol,
            kind,
            attempts,
            message: message.into(),
        }
    }

    /// Build a failure from the last attempt's error
    pub fn from_error(symbol: Symbol, error: AgentError, attempts: u32) -> Self {
        Self {
            symbol,
            kind: error.kind,
            attempts,
            message: error.message,
        }
    }
}

/// Exactly one of success or failure for a symbol
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Outcome {
    #[serde(rename = "ok")]
    Success(AgentResult),
    #[serde(rename = "error")]
    Failure(Failure),
}

impl Outcome {
    pub fn symbol(&self) -> &Symbol {
        match self {
            Outcome::Success(result) => &result.symbol,
            Outcome::Failure(failure) => &failure.symbol,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    pub fn attempts(&self) -> u32 {
        match self {
            Outcome::Success(result) => result.attempts,
            Outcome::Failure(failure) => failure.attempts,
        }
    }

    pub fn as_success(&self) -> Option<&AgentResult> {
        match self {
            Outcome::Success(result) => Some(result),
            Outcome::Failure(_) => None,
        }
    }

    pub fn as_failure(&self) -> Option<&Failure> {
        match self {
            Outcome::Success(_) => None,
            Outcome::Failure(failure) => Some(failure),
        }
    }
}
