//! Command-line interface for autohedge
//!
//! Runs one analysis per ticker against the mock market data agent and
//! prints the aggregated report.

mod render;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use hedge_agents::MockTickerAgent;
use hedge_pipeline::{OverallStatus, Pipeline, PipelineConfig};
use hedge_utils::AppConfig;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

const DEFAULT_TASK: &str = "As BlackRock, let's evaluate AI companies for a portfolio with $500 million in allocation, aiming for a balanced risk-reward profile.";

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Format {
    Json,
    Table,
}

#[derive(Parser, Debug)]
#[command(name = "autohedge")]
#[command(about = "Fan a trading analysis task out over a portfolio", long_about = None)]
struct Args {
    /// Analysis task applied to every ticker
    #[arg(short, long, default_value = DEFAULT_TASK)]
    task: String,

    /// Comma separated tickers
    #[arg(short, long, value_delimiter = ',', default_values = ["NVDA", "TSLA", "MSFT", "GOOG"])]
    stocks: Vec<String>,

    /// Maximum concurrent agent invocations (overrides HEDGE_CONCURRENCY)
    #[arg(long)]
    concurrency: Option<usize>,

    /// Maximum attempts per ticker (overrides HEDGE_MAX_ATTEMPTS)
    #[arg(long)]
    max_attempts: Option<u32>,

    /// Overall run deadline in seconds (overrides HEDGE_RUN_DEADLINE_SECS)
    #[arg(long)]
    deadline_secs: Option<u64>,

    /// Simulated latency of the mock agent, in milliseconds
    #[arg(long, default_value_t = 0)]
    latency_ms: u64,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = Format::Table)]
    format: Format,
}

impl Args {
    fn pipeline_config(&self) -> anyhow::Result<PipelineConfig> {
        let mut config =
            PipelineConfig::from_env().context("failed to read pipeline settings from environment")?;

        if let Some(concurrency) = self.concurrency {
            config.concurrency_limit = concurrency;
        }
        if let Some(max_attempts) = self.max_attempts {
            config.max_attempts = max_attempts;
        }
        if let Some(secs) = self.deadline_secs {
            config.run_deadline = Some(Duration::from_secs(secs));
        }

        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let app = AppConfig::from_env();
    hedge_utils::init_for(&app);

    let args = Args::parse();
    let config = args.pipeline_config()?;

    info!("Starting {} for {} ticker(s)", app.app_name, args.stocks.len());

    let agent = MockTickerAgent::new().with_latency(Duration::from_millis(args.latency_ms));
    let pipeline = Pipeline::new(Arc::new(agent), config)?;
    let report = pipeline.run(args.task.as_str(), args.stocks.as_slice()).await?;

    match args.format {
        Format::Json => println!("{}", render::json(&report)?),
        Format::Table => println!("{}", render::table(&report)),
    }

    Ok(match report.overall_status() {
        OverallStatus::Failed => ExitCode::from(2),
        OverallStatus::Complete | OverallStatus::Partial => ExitCode::SUCCESS,
    })
}
