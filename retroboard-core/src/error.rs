//! Unified error handling system
//!
//! Infrastructure failures carry an [`ErrorContext`] so that the id logged
//! next to a failure is the same id a client sees in its error response.

use std::collections::HashMap;
use thiserror::Error;
use tracing::{error, warn};

pub type RetroboardResult<T> = Result<T, RetroboardError>;

/// Where an infrastructure error happened and what might fix it
#[derive(Debug, Clone)]
pub struct ErrorContext {
    /// Correlates log lines with client-facing error ids
    pub error_id: String,
    /// Crate module that raised the error, e.g. `sqlite_store`
    pub component: String,
    /// Store or config operation in flight
    pub operation: Option<String>,
    pub metadata: HashMap<String, String>,
    pub recovery_suggestions: Vec<String>,
}

impl ErrorContext {
    pub fn new(component: &str) -> Self {
        Self {
            error_id: uuid::Uuid::new_v4().to_string(),
            component: component.to_string(),
            operation: None,
            metadata: HashMap::new(),
            recovery_suggestions: Vec::new(),
        }
    }

    pub fn with_operation(mut self, operation: &str) -> Self {
        self.operation = Some(operation.to_string());
        self
    }

    pub fn with_metadata(mut self, key: &str, value: &str) -> Self {
        self.metadata.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_suggestion(mut self, suggestion: &str) -> Self {
        self.recovery_suggestions.push(suggestion.to_string());
        self
    }
}

/// Infrastructure-level error type shared by all Retroboard crates
#[derive(Error, Debug)]
pub enum RetroboardError {
    #[error("Storage error: {message}")]
    Storage {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: ErrorContext,
    },

    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: ErrorContext,
    },

    #[error("Operation timeout: {operation}")]
    Timeout {
        operation: String,
        duration_ms: u64,
        context: ErrorContext,
    },
}

impl RetroboardError {
    pub fn context(&self) -> &ErrorContext {
        match self {
            RetroboardError::Storage { context, .. }
            | RetroboardError::Config { context, .. }
            | RetroboardError::Timeout { context, .. } => context,
        }
    }

    pub fn error_id(&self) -> &str {
        &self.context().error_id
    }

    /// A retry of the same call may succeed without any change on our side
    pub fn is_recoverable(&self) -> bool {
        matches!(self, RetroboardError::Timeout { .. })
    }

    /// Log the error at warn level when it is recoverable, error level otherwise
    pub fn log(&self) {
        let context = self.context();
        if self.is_recoverable() {
            warn!(
                error_id = %context.error_id,
                component = %context.component,
                operation = ?context.operation,
                error = %self,
                "Recoverable infrastructure error"
            );
        } else {
            error!(
                error_id = %context.error_id,
                component = %context.component,
                operation = ?context.operation,
                suggestions = ?context.recovery_suggestions,
                error = %self,
                "Infrastructure error"
            );
        }
    }
}

/// Convenience macros for creating errors with context
#[macro_export]
macro_rules! storage_error {
    ($msg:expr, $component:expr) => {
        $crate::RetroboardError::Storage {
            message: $msg.to_string(),
            source: None,
            context: $crate::ErrorContext::new($component),
        }
    };
    ($msg:expr, $component:expr, $source:expr) => {
        $crate::RetroboardError::Storage {
            message: $msg.to_string(),
            source: Some(Box::new($source)),
            context: $crate::ErrorContext::new($component),
        }
    };
}

#[macro_export]
macro_rules! config_error {
    ($msg:expr, $component:expr) => {
        $crate::RetroboardError::Config {
            message: $msg.to_string(),
            source: None,
            context: $crate::ErrorContext::new($component)
                .with_suggestion("Check your configuration file"),
        }
    };
}
