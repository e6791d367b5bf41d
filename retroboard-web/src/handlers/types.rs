//! Request and response payloads

use serde::Serialize;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub version: String,
    /// `memory` or `sqlite`
    pub storage: String,
}

/// Body of every error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error category, e.g. `denied` or `not_found`
    pub error: String,
    /// Denial reason code, present for authorization failures
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub message: String,
}
