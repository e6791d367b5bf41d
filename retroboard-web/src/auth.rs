//! Caller identity
//!
//! Credentials are verified upstream; the verified user id arrives in the
//! `X-User-Id` header.

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, HeaderName, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use retroboard_sessions::UserId;
use serde_json::json;
use tracing::debug;
use uuid::Uuid;

pub const USER_ID_HEADER: HeaderName = HeaderName::from_static("x-user-id");

/// The user on whose behalf a request is made
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallerIdentity(pub UserId);

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("missing X-User-Id header")]
    MissingIdentity,
    #[error("X-User-Id is not a valid user id")]
    InvalidIdentity,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": "unauthorized",
            "message": self.to_string(),
        }));
        (StatusCode::UNAUTHORIZED, body).into_response()
    }
}

impl<S> FromRequestParts<S> for CallerIdentity
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(&USER_ID_HEADER)
            .ok_or(AuthError::MissingIdentity)?
            .to_str()
            .map_err(|_| AuthError::InvalidIdentity)?;

        let user = Uuid::parse_str(value.trim()).map_err(|_| {
            debug!("Rejected malformed caller identity");
            AuthError::InvalidIdentity
        })?;

        Ok(CallerIdentity(user))
    }
}
