//! Fan-out/fan-in orchestration for autohedge
//!
//! Given a task and a portfolio, the [`Pipeline`] runs one analysis per
//! symbol through a bounded worker pool, retries transient failures with
//! exponential backoff, and merges every outcome into a single [`Report`]
//! ordered like the input portfolio. One symbol failing never aborts the
//! others; partial failure is an ordinary report.
//!
//! # Architecture
//!
//! - [`AgentInvoker`]: one attempt, with timeout and cancellation
//! - [`RetryController`]: bounded retry with backoff around the invoker
//! - [`DispatchPool`]: bounded fan-out, streaming completions
//! - [`ResultAggregator`]: single-writer fan-in, deadline enforcement
//! - [`Pipeline`]: validates input and composes the above
//!
//! # Example
//!
//! ```rust,ignore
//! use hedge_agents::MockTickerAgent;
//! use hedge_pipeline::{Pipeline, PipelineConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let pipeline = Pipeline::new(Arc::new(MockTickerAgent::new()), PipelineConfig::default())?;
//!     let report = pipeline.run("evaluate", &["NVDA", "TSLA"]).await?;
//!     println!("{}", serde_json::to_string_pretty(&report)?);
//!     Ok(())
//! }
//! ```

pub mod aggregator;
pub mod config;
pub mod dispatch;
pub mod invoker;
pub mod orchestrator;
pub mod report;
pub mod retry;
pub mod stages;

pub use aggregator::{ResultAggregator, RunOutcome};
pub use config::{PipelineConfig, PipelineConfigBuilder};
pub use dispatch::{Completion, DispatchPool};
pub use invoker::AgentInvoker;
pub use orchestrator::Pipeline;
pub use report::{EntryStatus, OverallStatus, Report, ReportEntry, ReportSummary};
pub use retry::{Analysis, RetryController, RetryPolicy, Sleeper, TokioSleeper};
pub use stages::{StagedAgent, StagedAgentBuilder};

// Re-export the core vocabulary for convenience
pub use hedge_core::{
    AgentError, AgentOutput, AgentResult, AnalysisAgent, Error, ErrorKind, Failure, Outcome,
    Portfolio, Symbol, Task,
};
