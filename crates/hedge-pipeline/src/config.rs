//! Configuration for pipeline runs

use crate::retry::RetryPolicy;
use hedge_core::{Error, ErrorKind, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Options the orchestrator needs for a run
///
/// Anything agent-specific (model choice, prompts, data providers) belongs
/// to the [`hedge_core::AnalysisAgent`] implementation, not here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Maximum number of agent invocations in flight at once
    pub concurrency_limit: usize,

    /// Maximum attempts per symbol, including the first
    pub max_attempts: u32,

    /// Delay before the second attempt
    pub backoff_base: Duration,

    /// Growth factor applied to the delay after each further attempt
    pub backoff_multiplier: f64,

    /// Upper bound on any single backoff delay
    pub backoff_cap: Duration,

    /// Timeout applied to every single agent invocation
    pub attempt_timeout: Duration,

    /// Overall deadline for the run, unbounded when `None`
    pub run_deadline: Option<Duration>,

    /// Error kinds eligible for retry
    pub retryable_kinds: Vec<ErrorKind>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            concurrency_limit: 4,
            max_attempts: 3,
            backoff_base: Duration::from_millis(500),
            backoff_multiplier: 2.0,
            backoff_cap: Duration::from_secs(10),
            attempt_timeout: Duration::from_secs(60),
            run_deadline: None,
            retryable_kinds: ErrorKind::DEFAULT_RETRYABLE.to_vec(),
        }
    }
}

impl PipelineConfig {
    /// Create a new configuration builder
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    /// Load configuration from `HEDGE_*` environment variables over defaults
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup
    ///
    /// Recognized keys: `HEDGE_CONCURRENCY`, `HEDGE_MAX_ATTEMPTS`,
    /// `HEDGE_BACKOFF_BASE_MS`, `HEDGE_BACKOFF_MULTIPLIER`,
    /// `HEDGE_BACKOFF_CAP_MS`, `HEDGE_ATTEMPT_TIMEOUT_SECS`,
    /// `HEDGE_RUN_DEADLINE_SECS`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut builder = Self::builder();

        if let Some(v) = parse_var::<usize>(&lookup, "HEDGE_CONCURRENCY")? {
            builder = builder.concurrency_limit(v);
        }
        if let Some(v) = parse_var::<u32>(&lookup, "HEDGE_MAX_ATTEMPTS")? {
            builder = builder.max_attempts(v);
        }
        if let Some(v) = parse_var::<u64>(&lookup, "HEDGE_BACKOFF_BASE_MS")? {
            builder = builder.backoff_base(Duration::from_millis(v));
        }
        if let Some(v) = parse_var::<f64>(&lookup, "HEDGE_BACKOFF_MULTIPLIER")? {
            builder = builder.backoff_multiplier(v);
        }
        if let Some(v) = parse_var::<u64>(&lookup, "HEDGE_BACKOFF_CAP_MS")? {
            builder = builder.backoff_cap(Duration::from_millis(v));
        }
        if let Some(v) = parse_var::<u64>(&lookup, "HEDGE_ATTEMPT_TIMEOUT_SECS")? {
            builder = builder.attempt_timeout(Duration::from_secs(v));
        }
        if let Some(v) = parse_var::<u64>(&lookup, "HEDGE_RUN_DEADLINE_SECS")? {
            builder = builder.run_deadline(Duration::from_secs(v));
        }

        builder.build()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.concurrency_limit == 0 {
            return Err(Error::InvalidConfig(
                "concurrency_limit must be at least 1".to_string(),
            ));
        }

        if self.max_attempts == 0 {
            return Err(Error::InvalidConfig(
                "max_attempts must be at least 1".to_string(),
            ));
        }

        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err(Error::InvalidConfig(format!(
                "backoff_multiplier must be a finite number >= 1, got {}",
                self.backoff_multiplier
            )));
        }

        if self.backoff_cap < self.backoff_base {
            return Err(Error::InvalidConfig(format!(
                "backoff_cap ({:?}) is smaller than backoff_base ({:?})",
                self.backoff_cap, self.backoff_base
            )));
        }

        if self.attempt_timeout.is_zero() {
            return Err(Error::InvalidConfig(
                "attempt_timeout must be greater than zero".to_string(),
            ));
        }

        if self.run_deadline.is_some_and(|d| d.is_zero()) {
            return Err(Error::InvalidConfig(
                "run_deadline must be greater than zero when set".to_string(),
            ));
        }

        Ok(())
    }

    /// Retry policy derived from this configuration
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_attempts,
            self.backoff_base,
            self.backoff_cap,
            self.backoff_multiplier,
        )
        .with_retryable_kinds(self.retryable_kinds.iter().copied())
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| Error::InvalidConfig(format!("{key}={raw:?}: {e}"))),
    }
}

/// Builder for PipelineConfig
#[derive(Debug, Default)]
pub struct PipelineConfigBuilder {
    concurrency_limit: Option<usize>,
    max_attempts: Option<u32>,
    backoff_base: Option<Duration>,
    backoff_multiplier: Option<f64>,
    backoff_cap: Option<Duration>,
    attempt_timeout: Option<Duration>,
    run_deadline: Option<Duration>,
    retryable_kinds: Option<Vec<ErrorKind>>,
}

impl PipelineConfigBuilder {
    /// Set the maximum number of concurrent invocations
    pub fn concurrency_limit(mut self, limit: usize) -> Self {
        self.concurrency_limit = Some(limit);
        self
    }

    /// Set maximum attempts per symbol
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    /// Set the base backoff delay
    pub fn backoff_base(mut self, duration: Duration) -> Self {
        self.backoff_base = Some(duration);
        self
    }

    /// Set the backoff multiplier
    pub fn backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = Some(multiplier);
        self
    }

    /// Set the backoff cap
    pub fn backoff_cap(mut self, duration: Duration) -> Self {
        self.backoff_cap = Some(duration);
        self
    }

    /// Set the per-invocation timeout
    pub fn attempt_timeout(mut self, duration: Duration) -> Self {
        self.attempt_timeout = Some(duration);
        self
    }

    /// Set the overall run deadline
    pub fn run_deadline(mut self, duration: Duration) -> Self {
        self.run_deadline = Some(duration);
        self
    }

    /// Replace the set of retryable error kinds
    pub fn retryable_kinds(mut self, kinds: impl IntoIterator<Item = ErrorKind>) -> Self {
        self.retryable_kinds = Some(kinds.into_iter().collect());
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<PipelineConfig> {
        let defaults = PipelineConfig::default();

        let config = PipelineConfig {
            concurrency_limit: self.concurrency_limit.unwrap_or(defaults.concurrency_limit),
            max_attempts: self.max_attempts.unwrap_or(defaults.max_attempts),
            backoff_base: self.backoff_base.unwrap_or(defaults.backoff_base),
            backoff_multiplier: self.backoff_multiplier.unwrap_or(defaults.backoff_multiplier),
            backoff_cap: self.backoff_cap.unwrap_or(defaults.backoff_cap),
            attempt_timeout: self.attempt_timeout.unwrap_or(defaults.attempt_timeout),
            run_deadline: self.run_deadline.or(defaults.run_deadline),
            retryable_kinds: self.retryable_kinds.unwrap_or(defaults.retryable_kinds),
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<&str, &str> = vars.iter().copied().collect();
        move |key| map.get(key).map(|v| (*v).to_string())
    }

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.concurrency_limit, 4);
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.run_deadline, None);
        assert_eq!(config.retryable_kinds, ErrorKind::DEFAULT_RETRYABLE.to_vec());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = PipelineConfig::builder()
            .concurrency_limit(8)
            .max_attempts(5)
            .run_deadline(Duration::from_secs(30))
            .build()
            .unwrap();

        assert_eq!(config.concurrency_limit, 8);
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.run_deadline, Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_validation_rejects_out_of_range() {
        assert!(PipelineConfig::builder().concurrency_limit(0).build().is_err());
        assert!(PipelineConfig::builder().max_attempts(0).build().is_err());
        assert!(PipelineConfig::builder().backoff_multiplier(0.5).build().is_err());
        assert!(PipelineConfig::builder().backoff_multiplier(f64::NAN).build().is_err());
        assert!(
            PipelineConfig::builder()
                .backoff_base(Duration::from_secs(5))
                .backoff_cap(Duration::from_secs(1))
                .build()
                .is_err()
        );
        assert!(PipelineConfig::builder().attempt_timeout(Duration::ZERO).build().is_err());
        assert!(PipelineConfig::builder().run_deadline(Duration::ZERO).build().is_err());
    }

    #[test]
    fn test_from_lookup_overrides_defaults() {
        let config = PipelineConfig::from_lookup(lookup_from(&[
            ("HEDGE_CONCURRENCY", "6"),
            ("HEDGE_MAX_ATTEMPTS", "2"),
            ("HEDGE_BACKOFF_BASE_MS", "250"),
            ("HEDGE_RUN_DEADLINE_SECS", "90"),
        ]))
        .unwrap();

        assert_eq!(config.concurrency_limit, 6);
        assert_eq!(config.max_attempts, 2);
        assert_eq!(config.backoff_base, Duration::from_millis(250));
        assert_eq!(config.run_deadline, Some(Duration::from_secs(90)));
        assert_eq!(config.backoff_multiplier, 2.0);
    }

    #[test]
    fn test_from_lookup_rejects_garbage() {
        let err = PipelineConfig::from_lookup(lookup_from(&[("HEDGE_CONCURRENCY", "many")]))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(msg) if msg.contains("HEDGE_CONCURRENCY")));
    }

    #[test]
    fn test_retry_policy_mirrors_config() {
        let config = PipelineConfig::builder()
            .max_attempts(4)
            .retryable_kinds([ErrorKind::RateLimited])
            .build()
            .unwrap();
        let policy = config.retry_policy();

        assert_eq!(policy.max_attempts, 4);
        assert!(policy.is_retryable(ErrorKind::RateLimited));
        assert!(!policy.is_retryable(ErrorKind::Transient));
    }

    #[test]
    fn test_deserialize_partial_json() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{"concurrency_limit": 2, "retryable_kinds": ["Timeout"]}"#)
                .unwrap();
        assert_eq!(config.concurrency_limit, 2);
        assert_eq!(config.retryable_kinds, vec![ErrorKind::Timeout]);
        assert_eq!(config.max_attempts, 3);
    }
}
