//! HTTP error responses

use crate::handlers::types::ErrorResponse;
use axum::{
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use retroboard_sessions::SessionError;
use tracing::{error, warn};

/// Every failure a participant handler can return
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Undecodable path segment or request body
    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Session(e) => {
                StatusCode::from_u16(e.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    fn body(&self) -> ErrorResponse {
        match self {
            ApiError::Session(e) => ErrorResponse {
                error: e.category().to_string(),
                reason: e.denial_reason().map(|r| r.code().to_string()),
                message: e.user_message(),
            },
            ApiError::BadRequest(message) => ErrorResponse {
                error: "invalid_input".to_string(),
                reason: None,
                message: message.clone(),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            ApiError::Session(SessionError::Internal { error_id, .. }) => {
                error!(error_id = %error_id, "Request failed with internal error");
            }
            _ if status.is_client_error() => warn!(status = %status, error = %self, "Request rejected"),
            _ => {}
        }

        (status, Json(self.body())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use retroboard_sessions::DenialReason;

    #[test]
    fn test_denial_body_carries_reason() {
        let error = ApiError::from(SessionError::denied(DenialReason::SelfRoleChange));
        assert_eq!(error.status(), StatusCode::FORBIDDEN);

        let body = error.body();
        assert_eq!(body.error, "denied");
        assert_eq!(body.reason.as_deref(), Some("self_role_change"));
    }

    #[test]
    fn test_internal_body_is_generic() {
        let error = ApiError::from(SessionError::internal("disk I/O error at page 42"));
        assert_eq!(error.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!error.body().message.contains("page 42"));
        assert_eq!(error.body().reason, None);
    }

    #[test]
    fn test_conflict_status() {
        let error = ApiError::from(SessionError::conflict("moderator changed"));
        assert_eq!(error.status(), StatusCode::CONFLICT);
    }
}
