//! Retroboard Core - Shared infrastructure for the session registry
//!
//! This crate holds the pieces every other Retroboard crate leans on:
//! structured errors with context, configuration loading and the logging
//! bootstrap. Domain logic lives in `retroboard-sessions`.

pub mod async_utils;
pub mod config;
pub mod error;
pub mod logging;
pub mod types;

pub use async_utils::*;
pub use error::*;
pub use logging::*;
pub use types::*;

// Re-export commonly used external types
pub use async_trait::async_trait;
pub use tokio;
pub use tracing;
