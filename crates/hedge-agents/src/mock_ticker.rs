//! Market data agent returning simulated figures

use async_trait::async_trait;
use hedge_core::{AgentError, AgentOutput, AnalysisAgent, Symbol, Task};
use std::time::Duration;
use tracing::debug;

/// Agent that answers every ticker with the same simulated market data
///
/// Useful for demos and smoke tests of the pipeline without an LLM or a
/// market data provider behind it.
#[derive(Debug, Clone, Default)]
pub struct MockTickerAgent {
    latency: Option<Duration>,
}

impl MockTickerAgent {
    /// Create a new mock agent with no latency
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate a slow data provider
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = (!latency.is_zero()).then_some(latency);
        self
    }

    pub fn latency(&self) -> Option<Duration> {
        self.latency
    }

    /// The text returned for `symbol`
    pub fn market_data(symbol: &Symbol) -> String {
        format!(
            "Mock market data for {symbol}: current_price=150.0, volume=1000000, pe_ratio=25.5. This is simulated data."
        )
    }
}

#[async_trait]
impl AnalysisAgent for MockTickerAgent {
    async fn analyze(&self, symbol: &Symbol, _task: &Task) -> Result<AgentOutput, AgentError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        debug!("Returning mock market data for {}", symbol);
        Ok(AgentOutput::text(Self::market_data(symbol)))
    }

    fn name(&self) -> &str {
        "mock-ticker-agent"
    }
}
