//! Core abstractions for the autohedge pipeline
//!
//! This crate defines the vocabulary shared by every other crate in the
//! workspace:
//!
//! - [`Symbol`], [`Portfolio`] and [`Task`]: the immutable inputs of a run
//! - [`AnalysisAgent`]: the narrow capability a per-symbol collaborator implements
//! - [`AgentError`] and [`ErrorKind`]: how a single attempt fails
//! - [`AgentResult`], [`Failure`] and [`Outcome`]: what a run records per symbol
//! - [`Error`]: the few conditions that abort a run before dispatch

pub mod agent;
pub mod error;
pub mod outcome;
pub mod symbol;

pub use agent::{AgentOutput, AnalysisAgent};
pub use error::{AgentError, Error, ErrorKind, Result};
pub use outcome::{AgentResult, Failure, Outcome};
pub use symbol::{Portfolio, Symbol, Task};
