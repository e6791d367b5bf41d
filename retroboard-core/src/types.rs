//! Core configuration type definitions

use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};

/// Top-level Retroboard configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RetroboardConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

/// HTTP listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Upper bound on a single store operation, in milliseconds
    pub operation_timeout_ms: u64,
    /// Capacity of the session event broadcast channel
    pub event_buffer: usize,
}

/// Where session records live
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// `sqlite:` URL, or `memory` for the in-process store
    pub database_url: String,
    pub max_connections: u32,
    pub busy_timeout_ms: u64,
}

impl StorageConfig {
    pub fn is_memory(&self) -> bool {
        self.database_url == "memory"
    }
}
