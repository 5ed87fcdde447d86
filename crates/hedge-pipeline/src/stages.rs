//! Sequential composition of analysis stages
//!
//! A [`StagedAgent`] chains several agents (for example market analysis,
//! then thesis, then risk review) behind the single [`AnalysisAgent`]
//! contract, so the dispatch and aggregation layers stay unchanged. Each
//! stage sees the run task extended with the previous stage's payload.

use async_trait::async_trait;
use hedge_core::{AgentError, AgentOutput, AnalysisAgent, Error, Result, Symbol, Task};
use std::sync::Arc;
use tracing::debug;

struct Stage {
    name: String,
    agent: Arc<dyn AnalysisAgent>,
}

/// An agent that runs its stages one after another
///
/// # Example
///
/// ```no_run
/// use hedge_pipeline::StagedAgent;
/// use std::sync::Arc;
///
/// # fn example(
/// #     analyst: Arc<dyn hedge_core::AnalysisAgent>,
/// #     risk: Arc<dyn hedge_core::AnalysisAgent>,
/// # ) -> hedge_core::Result<()> {
/// let agent = StagedAgent::builder("analysis-then-risk")
///     .stage("analysis", analyst)
///     .stage("risk", risk)
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct StagedAgent {
    name: String,
    stages: Vec<Stage>,
}

impl StagedAgent {
    /// Create a new builder for a staged agent
    pub fn builder(name: impl Into<String>) -> StagedAgentBuilder {
        StagedAgentBuilder::new(name)
    }

    /// Get the number of stages
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Get the stage names in execution order
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name.as_str()).collect()
    }
}

fn next_stage_task(task: &Task, stage: &str, payload: Option<&str>) -> Task {
    Task::new(format!(
        "{task}\n\n--- Output of the {stage} stage ---\n{}",
        payload.unwrap_or("(no output)")
    ))
}

#[async_trait]
impl AnalysisAgent for StagedAgent {
    async fn analyze(&self, symbol: &Symbol, task: &Task) -> std::result::Result<AgentOutput, AgentError> {
        let mut stage_task = task.clone();
        let mut output = AgentOutput::empty();

        for stage in &self.stages {
            debug!("{}: running stage '{}' for {}", self.name, stage.name, symbol);

            output = stage
                .agent
                .analyze(symbol, &stage_task)
                .await
                .map_err(|e| AgentError::new(e.kind, format!("stage '{}': {}", stage.name, e.message)))?;

            stage_task = next_stage_task(task, &stage.name, output.payload.as_deref());
        }

        Ok(output)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Builder for StagedAgent
pub struct StagedAgentBuilder {
    name: String,
    stages: Vec<Stage>,
}

impl StagedAgentBuilder {
    /// Create a new builder
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stages: Vec::new(),
        }
    }

    /// Append a stage
    pub fn stage(mut self, name: impl Into<String>, agent: Arc<dyn AnalysisAgent>) -> Self {
        self.stages.push(Stage {
            name: name.into(),
            agent,
        });
        self
    }

    /// Build the staged agent
    ///
    /// # Errors
    ///
    /// Returns an error if no stages were added
    pub fn build(self) -> Result<StagedAgent> {
        if self.stages.is_empty() {
            return Err(Error::InvalidConfig(format!(
                "staged agent '{}' has no stages",
                self.name
            )));
        }

        Ok(StagedAgent {
            name: self.name,
            stages: self.stages,
        })
    }
}
