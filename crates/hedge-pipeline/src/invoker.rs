//! Single-attempt agent invocation

use hedge_core::{AgentError, AgentOutput, AnalysisAgent, Symbol, Task};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Wraps an [`AnalysisAgent`] behind a uniform single-attempt contract
///
/// Every call is one attempt, bounded by the invoker's timeout and aborted
/// as soon as the run's cancellation token fires. No retry happens here.
#[derive(Clone)]
pub struct AgentInvoker {
    agent: Arc<dyn AnalysisAgent>,
    timeout: Duration,
}

impl AgentInvoker {
    /// Create an invoker with a per-attempt timeout
    pub fn new(agent: Arc<dyn AnalysisAgent>, timeout: Duration) -> Self {
        Self { agent, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn agent_name(&self) -> &str {
        self.agent.name()
    }

    /// Run one attempt for `symbol`
    ///
    /// Fails with `Timeout` when the agent does not answer in time and with
    /// `Cancelled` when the run is cancelled first. Dropping the agent future
    /// is how an in-flight call is aborted.
    pub async fn invoke(
        &self,
        symbol: &Symbol,
        task: &Task,
        cancel: &CancellationToken,
    ) -> Result<AgentOutput, AgentError> {
        if cancel.is_cancelled() {
            return Err(AgentError::cancelled("run cancelled before invocation"));
        }

        debug!("Invoking {} for {}", self.agent.name(), symbol);

        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                Err(AgentError::cancelled("run cancelled during invocation"))
            }
            result = tokio::time::timeout(self.timeout, self.agent.analyze(symbol, task)) => {
                result.unwrap_or_else(|_| {
                    Err(AgentError::timeout(format!(
                        "no response from {} within {:?}",
                        self.agent.name(),
                        self.timeout
                    )))
                })
            }
        }
    }
}
