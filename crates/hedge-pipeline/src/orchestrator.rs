//! Pipeline orchestrator: the entry point of a run

use crate::aggregator::ResultAggregator;
use crate::config::PipelineConfig;
use crate::dispatch::DispatchPool;
use crate::invoker::AgentInvoker;
use crate::report::Report;
use crate::retry::{RetryController, Sleeper, TokioSleeper};
use hedge_core::{AnalysisAgent, Portfolio, Result, Task};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, info, info_span};
use uuid::Uuid;

/// Fans a task out over a portfolio and fans the outcomes back into a [`Report`]
///
/// # Example
///
/// ```no_run
/// use hedge_pipeline::{Pipeline, PipelineConfig};
/// use std::sync::Arc;
///
/// # async fn example(agent: Arc<dyn hedge_core::AnalysisAgent>) -> hedge_core::Result<()> {
/// let pipeline = Pipeline::new(agent, PipelineConfig::default())?;
/// let report = pipeline.run("evaluate AI names", &["NVDA", "TSLA"]).await?;
/// println!("{}", report.overall_status());
/// # Ok(())
/// # }
/// ```
pub struct Pipeline {
    agent: Arc<dyn AnalysisAgent>,
    config: PipelineConfig,
    sleeper: Arc<dyn Sleeper>,
}

impl Pipeline {
    /// Create a pipeline around an agent
    ///
    /// # Errors
    ///
    /// Returns [`hedge_core::Error::InvalidConfig`] if the configuration does
    /// not validate.
    pub fn new(agent: Arc<dyn AnalysisAgent>, config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            agent,
            config,
            sleeper: Arc::new(TokioSleeper),
        })
    }

    /// Replace the sleeper used for retry backoff
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run `task` over the given tickers
    ///
    /// Fails only when the portfolio is empty, contains an invalid or
    /// duplicate symbol, or the worker pool cannot be created. Per-symbol
    /// failures are reported inside the returned [`Report`].
    pub async fn run<S>(&self, task: impl Into<Task>, portfolio: &[S]) -> Result<Report>
    where
        S: AsRef<str>,
    {
        self.run_with_cancellation(task, portfolio, CancellationToken::new())
            .await
    }

    /// Like [`Pipeline::run`], but stops early when `cancel` fires
    pub async fn run_with_cancellation<S>(
        &self,
        task: impl Into<Task>,
        portfolio: &[S],
        cancel: CancellationToken,
    ) -> Result<Report>
    where
        S: AsRef<str>,
    {
        let portfolio = Portfolio::new(portfolio)?;
        self.run_portfolio(task.into(), &portfolio, cancel).await
    }

    /// Run over an already validated portfolio
    pub async fn run_portfolio(
        &self,
        task: Task,
        portfolio: &Portfolio,
        cancel: CancellationToken,
    ) -> Result<Report> {
        let span = info_span!("pipeline_run", run_id = %Uuid::new_v4());
        self.execute(task, portfolio, cancel).instrument(span).await
    }

    async fn execute(
        &self,
        task: Task,
        portfolio: &Portfolio,
        cancel: CancellationToken,
    ) -> Result<Report> {
        let started = Instant::now();
        info!(
            "Starting run with {} over {} symbol(s) (concurrency {}, max attempts {})",
            self.agent.name(),
            portfolio.len(),
            self.config.concurrency_limit,
            self.config.max_attempts
        );

        // Child token: finishing this run must not cancel the caller's token
        let run_cancel = cancel.child_token();

        let invoker = AgentInvoker::new(Arc::clone(&self.agent), self.config.attempt_timeout);
        let retry =
            RetryController::with_sleeper(self.config.retry_policy(), Arc::clone(&self.sleeper));
        let pool = DispatchPool::new(invoker, retry, self.config.concurrency_limit)?;

        let symbols = portfolio.symbols().to_vec();
        let mut completions = pool.dispatch(symbols.clone(), task, run_cancel.clone());
        let outcome = ResultAggregator::new(&symbols)
            .collect(&mut completions, self.config.run_deadline)
            .await;

        // Stragglers past the deadline unwind on their own
        run_cancel.cancel();

        let report = Report::new(symbols, outcome);
        info!(
            "Run finished {} in {:?}: {} succeeded, {} failed",
            report.overall_status(),
            started.elapsed(),
            report.succeeded(),
            report.failed()
        );

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::OverallStatus;
    use async_trait::async_trait;
    use hedge_core::{AgentError, AgentOutput, Error, ErrorKind, Outcome, Symbol};
    use std::time::Duration;
    use tokio_test::{assert_err, assert_ok};

    struct EchoAgent;

    #[async_trait]
    impl AnalysisAgent for EchoAgent {
        async fn analyze(&self, symbol: &Symbol, task: &Task) -> std::result::Result<AgentOutput, AgentError> {
            Ok(AgentOutput::text(format!("{task}:{symbol}")))
        }

        fn name(&self) -> &str {
            "echo"
        }
    }

    fn pipeline() -> Pipeline {
        Pipeline::new(Arc::new(EchoAgent), PipelineConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn test_run_normalises_symbols() {
        let report = assert_ok!(pipeline().run("t", &[" nvda ", "TSLA"]).await);

        assert_eq!(report.overall_status(), OverallStatus::Complete);
        let order: Vec<&str> = report.symbols().iter().map(Symbol::as_str).collect();
        assert_eq!(order, vec!["NVDA", "TSLA"]);
        let nvda = report.outcome(&Symbol::parse("NVDA").unwrap()).and_then(Outcome::as_success).unwrap();
        assert_eq!(nvda.payload.as_deref(), Some("t:NVDA"));
    }

    #[tokio::test]
    async fn test_run_rejects_bad_portfolios() {
        let pipeline = pipeline();

        let empty: [&str; 0] = [];
        let err = assert_err!(pipeline.run("t", &empty).await);
        assert!(matches!(err, Error::InvalidPortfolio(_)));

        let err = assert_err!(pipeline.run("t", &["NVDA", "nvda"]).await);
        assert!(matches!(err, Error::InvalidPortfolio(_)));

        let err = assert_err!(pipeline.run("t", &["NVDA", "NO WAY"]).await);
        assert!(matches!(err, Error::InvalidSymbol(_)));
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let config = PipelineConfig {
            max_attempts: 0,
            ..PipelineConfig::default()
        };
        let result = Pipeline::new(Arc::new(EchoAgent), config);
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_pre_cancelled_run_fails_every_symbol() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let report = assert_ok!(
            pipeline()
                .run_with_cancellation("t", &["NVDA", "TSLA", "MSFT"], cancel)
                .await
        );

        assert_eq!(report.overall_status(), OverallStatus::Failed);
        assert_eq!(report.failed(), 3);
        for outcome in report.iter() {
            assert_eq!(outcome.as_failure().map(|f| f.kind), Some(ErrorKind::Cancelled));
        }
    }

    #[tokio::test]
    async fn test_finished_run_leaves_caller_token_alone() {
        let cancel = CancellationToken::new();
        let config = PipelineConfig::builder()
            .run_deadline(Duration::from_secs(30))
            .build()
            .unwrap();
        let pipeline = Pipeline::new(Arc::new(EchoAgent), config).unwrap();

        assert_ok!(pipeline.run_with_cancellation("t", &["NVDA"], cancel.clone()).await);
        assert!(!cancel.is_cancelled());
    }
}
