//! The per-symbol analysis capability

use crate::error::AgentError;
use crate::symbol::{Symbol, Task};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// What an agent produced for one symbol
///
/// The payload is optional: an agent may legitimately have nothing to say
/// about a symbol, and that is still a success.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentOutput {
    pub payload: Option<String>,
}

impl AgentOutput {
    /// Output carrying a textual payload
    pub fn text(payload: impl Into<String>) -> Self {
        Self {
            payload: Some(payload.into()),
        }
    }

    /// Output with no payload
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Capability implemented by every per-symbol collaborator
///
/// The pipeline only knows this contract. Model choice, prompts and
/// market-data retrieval stay inside the implementation. One call is one
/// attempt: implementations must not retry internally, and must not share
/// mutable state between calls for different symbols.
#[async_trait]
pub trait AnalysisAgent: Send + Sync {
    /// Analyze one symbol for the given task
    async fn analyze(&self, symbol: &Symbol, task: &Task) -> Result<AgentOutput, AgentError>;

    /// Get the agent's name
    fn name(&self) -> &str {
        "analysis-agent"
    }
}
