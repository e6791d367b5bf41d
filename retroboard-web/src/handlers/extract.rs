//! Extractors whose rejections render as [`ApiError`]

use crate::ApiError;
use axum::extract::{FromRequest, FromRequestParts};

/// JSON body; decode failures become 400 responses
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// Path parameters; malformed identifiers become 400 responses
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct ApiPath<T>(pub T);
