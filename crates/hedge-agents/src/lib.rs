//! Analysis agents for autohedge
//!
//! Concrete [`hedge_core::AnalysisAgent`] implementations that need no
//! network access:
//!
//! - [`MockTickerAgent`]: canned market data for any ticker, with optional
//!   simulated latency
//! - [`ScriptedAgent`]: per-symbol response scripts, for exercising retry,
//!   partial failure and concurrency behavior deterministically

pub mod mock_ticker;
pub mod scripted;

pub use mock_ticker::MockTickerAgent;
pub use scripted::{ScriptedAgent, Step};
