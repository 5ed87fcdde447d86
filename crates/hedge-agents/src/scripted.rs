//! Agent driven by per-symbol response scripts

use async_trait::async_trait;
use hedge_core::{AgentError, AgentOutput, AnalysisAgent, ErrorKind, Symbol, Task};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::debug;

/// One scripted response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Return this output
    Succeed(AgentOutput),
    /// Return this error
    Fail(AgentError),
    /// Never answer; the caller's timeout or cancellation has to end the call
    Hang,
}

impl Step {
    pub fn ok(payload: impl Into<String>) -> Self {
        Step::Succeed(AgentOutput::text(payload))
    }

    pub fn empty() -> Self {
        Step::Succeed(AgentOutput::empty())
    }

    pub fn fail(kind: ErrorKind, message: impl Into<String>) -> Self {
        Step::Fail(AgentError::new(kind, message))
    }
}

/// Agent answering from a per-symbol script
///
/// The n-th call for a symbol plays the n-th step of its script; once the
/// script is exhausted its last step repeats. Symbols without a script
/// play the fallback step, or succeed with `"scripted analysis of <SYMBOL>"`
/// when no fallback is set.
///
/// The agent counts calls per symbol and tracks how many calls were in
/// flight at the same time.
///
/// # Example
///
/// ```rust,ignore
/// let agent = ScriptedAgent::new()
///     .fail_then_succeed("NVDA", ErrorKind::Transient, 2)
///     .script("XXXX", vec![Step::fail(ErrorKind::InvalidInput, "unknown ticker")]);
/// ```
#[derive(Debug, Default)]
pub struct ScriptedAgent {
    name: Option<String>,
    scripts: HashMap<String, Vec<Step>>,
    fallback: Option<Step>,
    latency: Option<Duration>,
    calls: Mutex<HashMap<String, u32>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

fn key(symbol: &str) -> String {
    symbol.trim().to_ascii_uppercase()
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Decrements the in-flight gauge when a call ends or is dropped
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ScriptedAgent {
    /// Create an agent where every symbol succeeds on its first call
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the name reported by [`AnalysisAgent::name`]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Script the responses for one symbol
    pub fn script(mut self, symbol: &str, steps: Vec<Step>) -> Self {
        self.scripts.insert(key(symbol), steps);
        self
    }

    /// Fail `failures` times with `kind`, then succeed
    pub fn fail_then_succeed(self, symbol: &str, kind: ErrorKind, failures: u32) -> Self {
        let mut steps: Vec<Step> = (1..=failures)
            .map(|n| Step::fail(kind, format!("scripted failure {n}")))
            .collect();
        steps.push(Step::ok(format!("recovered {}", key(symbol))));
        self.script(symbol, steps)
    }

    /// Step played by symbols without a script
    pub fn with_fallback(mut self, step: Step) -> Self {
        self.fallback = Some(step);
        self
    }

    /// Delay every call before playing its step
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Number of calls made for `symbol`
    pub fn calls(&self, symbol: &str) -> u32 {
        lock(&self.calls).get(&key(symbol)).copied().unwrap_or(0)
    }

    /// Number of calls made across all symbols
    pub fn total_calls(&self) -> u32 {
        lock(&self.calls).values().sum()
    }

    /// Highest number of calls observed in flight at once
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn step_for(&self, symbol: &Symbol, call: u32) -> Step {
        let index = usize::try_from(call.saturating_sub(1)).unwrap_or(usize::MAX);
        match self.scripts.get(symbol.as_str()) {
            Some(steps) => steps
                .get(index)
                .or_else(|| steps.last())
                .cloned()
                .unwrap_or_else(Step::empty),
            None => self
                .fallback
                .clone()
                .unwrap_or_else(|| Step::ok(format!("scripted analysis of {symbol}"))),
        }
    }
}

#[async_trait]
impl AnalysisAgent for ScriptedAgent {
    async fn analyze(&self, symbol: &Symbol, _task: &Task) -> Result<AgentOutput, AgentError> {
        let call = {
            let mut calls = lock(&self.calls);
            let count = calls.entry(symbol.as_str().to_string()).or_insert(0);
            *count += 1;
            *count
        };

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let _gauge = InFlight(&self.in_flight);

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let step = self.step_for(symbol, call);
        debug!("{} call #{}: {:?}", symbol, call, step);

        match step {
            Step::Succeed(output) => Ok(output),
            Step::Fail(err) => Err(err),
            Step::Hang => std::future::pending().await,
        }
    }

    fn name(&self) -> &str {
        self.name.as_deref().unwrap_or("scripted-agent")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    fn sym(name: &str) -> Symbol {
        Symbol::parse(name).unwrap()
    }

    async fn call(agent: &ScriptedAgent, name: &str) -> Result<AgentOutput, AgentError> {
        agent.analyze(&sym(name), &Task::from("t")).await
    }

    #[tokio::test]
    async fn test_unscripted_symbols_succeed() {
        let agent = ScriptedAgent::new();

        let output = assert_ok!(call(&agent, "NVDA").await);

        assert_eq!(output.payload.as_deref(), Some("scripted analysis of NVDA"));
        assert_eq!(agent.calls("nvda"), 1);
        assert_eq!(agent.name(), "scripted-agent");
    }

    #[tokio::test]
    async fn test_script_plays_in_order_then_repeats_last() {
        let agent = ScriptedAgent::new().fail_then_succeed("TSLA", ErrorKind::RateLimited, 2);

        let first = assert_err!(call(&agent, "TSLA").await);
        assert_eq!(first.kind, ErrorKind::RateLimited);
        assert_err!(call(&agent, "TSLA").await);

        let third = assert_ok!(call(&agent, "TSLA").await);
        assert_eq!(third.payload.as_deref(), Some("recovered TSLA"));
        assert_ok!(call(&agent, "TSLA").await);

        assert_eq!(agent.calls("TSLA"), 4);
        assert_eq!(agent.total_calls(), 4);
    }

    #[tokio::test]
    async fn test_fallback_applies_to_unscripted_symbols() {
        let agent = ScriptedAgent::new()
            .script("MSFT", vec![Step::empty()])
            .with_fallback(Step::fail(ErrorKind::InvalidInput, "unknown ticker"));

        let msft = assert_ok!(call(&agent, "MSFT").await);
        assert_eq!(msft.payload, None);

        let goog = assert_err!(call(&agent, "GOOG").await);
        assert_eq!(goog.kind, ErrorKind::InvalidInput);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tracks_peak_concurrency() {
        let agent = ScriptedAgent::new().with_latency(Duration::from_millis(10));

        let (a, b, c) = tokio::join!(call(&agent, "A"), call(&agent, "B"), call(&agent, "C"));
        assert!(a.is_ok() && b.is_ok() && c.is_ok());

        assert_eq!(agent.peak_concurrency(), 3);
        assert_eq!(agent.in_flight.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hang_releases_gauge_when_dropped() {
        let agent = ScriptedAgent::new().script("HANG", vec![Step::Hang]);

        let result = tokio::time::timeout(Duration::from_secs(1), call(&agent, "HANG")).await;

        assert!(result.is_err());
        assert_eq!(agent.in_flight.load(Ordering::SeqCst), 0);
    }
}
