//! Retry logic with exponential backoff
//!
//! This module provides the retry policy applied to every symbol's agent
//! invocation, and the controller that drives one symbol through its
//! attempts. Backoff delays are a pure function of the attempt number so the
//! schedule can be tested without sleeping; the actual waiting goes through
//! the [`Sleeper`] trait so tests can substitute a fake clock.

use crate::invoker::AgentInvoker;
use async_trait::async_trait;
use hedge_core::{AgentOutput, ErrorKind, Failure, Symbol, Task};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Retry policy configuration
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first
    pub max_attempts: u32,

    /// Initial backoff duration
    pub initial_backoff: Duration,

    /// Maximum backoff duration
    pub max_backoff: Duration,

    /// Backoff multiplier (typically 2.0 for exponential backoff)
    pub backoff_multiplier: f64,

    /// Error kinds that may be retried
    pub retryable_kinds: BTreeSet<ErrorKind>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            retryable_kinds: ErrorKind::DEFAULT_RETRYABLE.into_iter().collect(),
        }
    }
}

impl RetryPolicy {
    /// Create a new retry policy with the default retryable kinds
    pub fn new(
        max_attempts: u32,
        initial_backoff: Duration,
        max_backoff: Duration,
        backoff_multiplier: f64,
    ) -> Self {
        Self {
            max_attempts,
            initial_backoff,
            max_backoff,
            backoff_multiplier,
            ..Self::default()
        }
    }

    /// Create a policy with no retries
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            backoff_multiplier: 1.0,
            ..Self::default()
        }
    }

    /// Create a policy with fast retries (for testing)
    pub fn fast() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(10),
            max_backoff: Duration::from_millis(100),
            backoff_multiplier: 2.0,
            ..Self::default()
        }
    }

    /// Replace the set of retryable kinds
    pub fn with_retryable_kinds(mut self, kinds: impl IntoIterator<Item = ErrorKind>) -> Self {
        self.retryable_kinds = kinds.into_iter().collect();
        self
    }

    /// Delay to wait after the given failed attempt (1-indexed)
    ///
    /// `base * multiplier^(attempt - 1)`, capped at `max_backoff`.
    pub fn backoff_duration(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let exponent = i32::try_from(attempt - 1).unwrap_or(i32::MAX);
        let backoff_secs =
            self.initial_backoff.as_secs_f64() * self.backoff_multiplier.powi(exponent);

        // Cap at max backoff; also guards against overflow to infinity
        if !backoff_secs.is_finite() || backoff_secs >= self.max_backoff.as_secs_f64() {
            self.max_backoff
        } else {
            Duration::from_secs_f64(backoff_secs)
        }
    }

    /// Check if an error kind should be retried
    pub fn is_retryable(&self, kind: ErrorKind) -> bool {
        kind.is_retry_eligible() && self.retryable_kinds.contains(&kind)
    }
}

/// Source of backoff waits
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Sleeper backed by the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// A successful per-symbol result before it is sequenced by the aggregator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Analysis {
    pub payload: Option<String>,
    pub attempts: u32,
}

/// Drives one symbol through its attempts according to a [`RetryPolicy`]
pub struct RetryController {
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl RetryController {
    /// Create a controller that sleeps on the tokio timer
    pub fn new(policy: RetryPolicy) -> Self {
        Self::with_sleeper(policy, Arc::new(TokioSleeper))
    }

    /// Create a controller with a custom sleeper
    pub fn with_sleeper(policy: RetryPolicy, sleeper: Arc<dyn Sleeper>) -> Self {
        Self { policy, sleeper }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Invoke the agent for one symbol, retrying retryable failures
    ///
    /// Attempt *n+1* never starts before attempt *n* has finished. A
    /// cancellation observed during a backoff wait ends the sequence with a
    /// `Cancelled` failure carrying the attempts made so far.
    pub async fn invoke_with_retry(
        &self,
        invoker: &AgentInvoker,
        symbol: &Symbol,
        task: &Task,
        cancel: &CancellationToken,
    ) -> Result<Analysis, Failure> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            debug!("Attempt {}/{} for {}", attempt, max_attempts, symbol);

            let error = match invoker.invoke(symbol, task, cancel).await {
                Ok(AgentOutput { payload }) => {
                    if attempt > 1 {
                        debug!("{} succeeded after {} attempts", symbol, attempt);
                    }
                    return Ok(Analysis {
                        payload,
                        attempts: attempt,
                    });
                }
                Err(e) => e,
            };

            if attempt >= max_attempts || !self.policy.is_retryable(error.kind) {
                warn!(
                    "{} failed after {} attempt(s) with {}: {}",
                    symbol, attempt, error.kind, error.message
                );
                return Err(Failure::from_error(symbol.clone(), error, attempt));
            }

            let backoff = self.policy.backoff_duration(attempt);
            warn!(
                "{} failed (attempt {}/{}): {}. Retrying in {:?}",
                symbol, attempt, max_attempts, error, backoff
            );

            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    return Err(Failure::new(
                        symbol.clone(),
                        ErrorKind::Cancelled,
                        attempt,
                        format!("run cancelled while backing off after: {}", error.message),
                    ));
                }
                () = self.sleeper.sleep(backoff) => {}
            }
        }
    }
}
