//! Shared utilities for autohedge
//!
//! This crate provides common functionality used across the workspace,
//! including logging setup and environment-derived application settings.

pub mod config;
pub mod logging;

pub use config::{AppConfig, Environment};
pub use logging::{init_for, init_tracing, init_tracing_json};
