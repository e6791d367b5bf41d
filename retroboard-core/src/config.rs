//! Configuration management

use crate::error::{ErrorContext, RetroboardError, RetroboardResult};
use crate::types::{RetroboardConfig, ServerConfig, StorageConfig};

use std::path::Path;

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            operation_timeout_ms: 5_000,
            event_buffer: 256,
        }
    }
}

impl ServerConfig {
    /// `host:port` to bind
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite:retroboard.db".to_string(),
            max_connections: 8,
            busy_timeout_ms: 2_000,
        }
    }
}

impl RetroboardConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> RetroboardResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| RetroboardError::Config {
            message: format!("Failed to read config file: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("read_file")
                .with_suggestion("Check if the config file exists and is readable"),
        })?;

        let config: RetroboardConfig =
            toml::from_str(&content).map_err(|e| RetroboardError::Config {
                message: format!("Failed to parse config: {}", e),
                source: Some(Box::new(e)),
                context: ErrorContext::new("config")
                    .with_operation("parse_toml")
                    .with_suggestion("Check TOML syntax in config file"),
            })?;

        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> RetroboardResult<()> {
        let content = toml::to_string_pretty(self).map_err(|e| RetroboardError::Config {
            message: format!("Failed to serialize config: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config").with_operation("serialize_toml"),
        })?;

        std::fs::write(path, content).map_err(|e| RetroboardError::Config {
            message: format!("Failed to write config file: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("write_file")
                .with_suggestion("Check if the directory exists and is writable"),
        })?;

        Ok(())
    }

    /// Override values from `RETROBOARD_HOST`, `RETROBOARD_PORT` and `DATABASE_URL`
    pub fn apply_env(&mut self) -> RetroboardResult<()> {
        if let Ok(host) = std::env::var("RETROBOARD_HOST") {
            self.server.host = host;
        }

        if let Ok(port) = std::env::var("RETROBOARD_PORT") {
            self.server.port = port.parse().map_err(|e| RetroboardError::Config {
                message: format!("Invalid RETROBOARD_PORT '{}': {}", port, e),
                source: Some(Box::new(e)),
                context: ErrorContext::new("config").with_operation("apply_env"),
            })?;
        }

        if let Ok(url) = std::env::var("DATABASE_URL") {
            self.storage.database_url = url;
        }

        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> RetroboardResult<()> {
        if self.server.operation_timeout_ms == 0 {
            return Err(RetroboardError::Config {
                message: "server.operation_timeout_ms must be greater than 0".to_string(),
                source: None,
                context: ErrorContext::new("config")
                    .with_operation("validate")
                    .with_suggestion("Set server.operation_timeout_ms to a positive value"),
            });
        }

        if self.server.event_buffer == 0 {
            return Err(crate::config_error!(
                "server.event_buffer must be greater than 0",
                "config"
            ));
        }

        if !self.storage.is_memory() && !self.storage.database_url.starts_with("sqlite:") {
            return Err(RetroboardError::Config {
                message: format!(
                    "Unsupported database URL: {}",
                    self.storage.database_url
                ),
                source: None,
                context: ErrorContext::new("config")
                    .with_operation("validate")
                    .with_suggestion("Use a sqlite: URL or 'memory'"),
            });
        }

        if self.storage.max_connections == 0 {
            return Err(crate::config_error!(
                "storage.max_connections must be greater than 0",
                "config"
            ));
        }

        Ok(())
    }
}
