//! Session operation error taxonomy
//!
//! Every failure of a public session operation is one of these variants.
//! Transport adapters map them to outward statuses with [`SessionError::http_status`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::store::StoreError;

/// Session operation result type
pub type SessionResult<T> = Result<T, SessionError>;

/// Why an authorization rule rejected a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialReason {
    /// Caller has no session on the board
    NotAMember,
    /// Caller tried to change their own role
    SelfRoleChange,
    /// Caller is not a moderator but targeted someone else
    InsufficientRole,
    /// Change would leave the board without a moderator
    LastModerator,
    /// Bulk updates may not include a role
    BulkRoleChangeForbidden,
}

impl DenialReason {
    pub fn code(&self) -> &'static str {
        match self {
            DenialReason::NotAMember => "not_a_member",
            DenialReason::SelfRoleChange => "self_role_change",
            DenialReason::InsufficientRole => "insufficient_role",
            DenialReason::LastModerator => "last_moderator",
            DenialReason::BulkRoleChangeForbidden => "bulk_role_change_forbidden",
        }
    }
}

impl std::fmt::Display for DenialReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            DenialReason::NotAMember => "caller is not a member of this board",
            DenialReason::SelfRoleChange => "participants cannot change their own role",
            DenialReason::InsufficientRole => "only moderators may change other sessions",
            DenialReason::LastModerator => "a board must keep at least one moderator",
            DenialReason::BulkRoleChangeForbidden => "roles cannot be changed in a bulk update",
        };
        f.write_str(text)
    }
}

/// Structured error types for session operations
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "error_type", content = "details")]
pub enum SessionError {
    /// Referenced board or session does not exist
    #[error("Not found: {resource}")]
    NotFound { resource: String },

    /// An authorization rule rejected the request
    #[error("Permission denied: {reason}")]
    Denied { reason: DenialReason },

    /// Request references unsupported fields or values
    #[error("Invalid input: {message}")]
    InvalidInput {
        message: String,
        field: Option<String>,
    },

    /// A commit-time precondition no longer held
    #[error("Conflict: {message}")]
    Conflict { message: String },

    /// Storage failure not attributable to the caller
    #[error("Internal error: {message}")]
    Internal { message: String, error_id: String },
}

impl SessionError {
    pub fn not_found<S: Into<String>>(resource: S) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    pub fn denied(reason: DenialReason) -> Self {
        Self::Denied { reason }
    }

    pub fn invalid_input<S: Into<String>>(message: S) -> Self {
        Self::InvalidInput {
            message: message.into(),
            field: None,
        }
    }

    pub fn conflict<S: Into<String>>(message: S) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
            error_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    /// Denial reason, if this is an authorization failure
    pub fn denial_reason(&self) -> Option<DenialReason> {
        match self {
            Self::Denied { reason } => Some(*reason),
            _ => None,
        }
    }

    /// Whether the caller can reasonably retry after refreshing state
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Conflict { .. } => true,
            Self::Internal { .. } => true,
            Self::NotFound { .. } => false,
            Self::Denied { .. } => false,
            Self::InvalidInput { .. } => false,
        }
    }

    /// Message safe to show to clients; internal details are never included
    pub fn user_message(&self) -> String {
        match self {
            Self::NotFound { resource } => format!("{} not found", resource),
            Self::Denied { reason } => format!("Permission denied: {}", reason),
            Self::InvalidInput { message, .. } => format!("Invalid input: {}", message),
            Self::Conflict { message } => {
                format!("{}. Refresh the board and try again.", message)
            }
            Self::Internal { .. } => {
                "An internal error occurred. Please try again later.".to_string()
            }
        }
    }

    pub fn category(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::Denied { .. } => "denied",
            Self::InvalidInput { .. } => "invalid_input",
            Self::Conflict { .. } => "conflict",
            Self::Internal { .. } => "internal",
        }
    }

    /// Convert to HTTP status code
    pub fn http_status(&self) -> u16 {
        match self {
            Self::NotFound { .. } => 404,
            Self::Denied { .. } => 403,
            Self::InvalidInput { .. } => 400,
            Self::Conflict { .. } => 409,
            Self::Internal { .. } => 500,
        }
    }
}

impl From<StoreError> for SessionError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { board, user } => {
                Self::not_found(format!("Session {} on board {}", user, board))
            }
            StoreError::Duplicate { board, user } => Self::conflict(format!(
                "Session {} already exists on board {}",
                user, board
            )),
            StoreError::LastModerator { .. } => Self::denied(DenialReason::LastModerator),
            StoreError::CallerNotModerator { board, caller } => Self::conflict(format!(
                "{} is no longer a moderator of board {}",
                caller, board
            )),
            StoreError::Backend(source) => {
                source.log();
                Self::Internal {
                    message: source.to_string(),
                    error_id: source.error_id().to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_http_status_mapping() {
        assert_eq!(SessionError::not_found("Session").http_status(), 404);
        assert_eq!(
            SessionError::denied(DenialReason::LastModerator).http_status(),
            403
        );
        assert_eq!(SessionError::invalid_input("empty").http_status(), 400);
        assert_eq!(SessionError::conflict("raced").http_status(), 409);
        assert_eq!(SessionError::internal("disk").http_status(), 500);
    }

    #[test]
    fn test_internal_message_is_generic() {
        let error = SessionError::internal("database is locked at /var/lib/retro.db");
        assert!(!error.user_message().contains("/var/lib"));
        assert_eq!(error.category(), "internal");
    }

    #[test]
    fn test_store_error_conversion() {
        let board = Uuid::new_v4();
        let user = Uuid::new_v4();

        let error: SessionError = StoreError::LastModerator { board }.into();
        assert_eq!(error.denial_reason(), Some(DenialReason::LastModerator));

        let error: SessionError = StoreError::CallerNotModerator {
            board,
            caller: user,
        }
        .into();
        assert!(matches!(error, SessionError::Conflict { .. }));
        assert!(error.is_recoverable());

        let error: SessionError = StoreError::NotFound { board, user }.into();
        assert!(matches!(error, SessionError::NotFound { .. }));
        assert!(!error.is_recoverable());
    }

    #[test]
    fn test_backend_error_keeps_its_error_id() {
        let source = retroboard_core::storage_error!("database is locked", "sqlite_store");
        let logged_id = source.error_id().to_string();

        let error: SessionError = StoreError::Backend(source).into();
        match &error {
            SessionError::Internal { error_id, message } => {
                assert_eq!(error_id, &logged_id);
                assert!(message.contains("database is locked"));
            }
            other => panic!("Expected Internal, got {:?}", other),
        }
        assert_eq!(error.http_status(), 500);
    }

    #[test]
    fn test_denial_serialization() {
        let error = SessionError::denied(DenialReason::BulkRoleChangeForbidden);
        let json = serde_json::to_value(&error).unwrap();
        assert_eq!(json["error_type"], "Denied");
        assert_eq!(json["details"]["reason"], "bulk_role_change_forbidden");
    }
}
