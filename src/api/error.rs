//! Error envelope for every API response.
//!
//! Failures are returned as `{ "error": { "code", "message", "details" } }`
//! with a status code that follows the error code.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::collection::CollectionError;
use crate::store::StoreError;
use crate::validation::FieldErrors;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    BadRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    ValidationError,
    InternalError,
    /// Store unreachable or timed out; safe to retry
    ServiceUnavailable,
    /// Store answered but refused the request (rules, quota, bad path)
    StoreRejected,
}

impl ErrorCode {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::BadRequest | ErrorCode::ValidationError => StatusCode::BAD_REQUEST,
            ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorCode::Forbidden => StatusCode::FORBIDDEN,
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorCode::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorCode::StoreRejected => StatusCode::BAD_GATEWAY,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::BadRequest => "bad_request",
            ErrorCode::Unauthorized => "unauthorized",
            ErrorCode::Forbidden => "forbidden",
            ErrorCode::NotFound => "not_found",
            ErrorCode::ValidationError => "validation_error",
            ErrorCode::InternalError => "internal_error",
            ErrorCode::ServiceUnavailable => "service_unavailable",
            ErrorCode::StoreRejected => "store_rejected",
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
    /// Field-level validation messages, keyed by wire field name
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<BTreeMap<String, Vec<String>>>,
}

#[derive(Debug, Serialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug)]
pub struct ApiError {
    code: ErrorCode,
    message: String,
    details: Option<BTreeMap<String, Vec<String>>>,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::BadRequest, message)
    }

    /// Missing or unknown token
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthorized, message)
    }

    /// Known token, but not an active admin
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Forbidden, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    /// 400 carrying every failed field; the message is the first one
    pub fn validation(errors: FieldErrors) -> Self {
        Self {
            code: ErrorCode::ValidationError,
            message: errors.summary(),
            details: Some(errors.into_map()),
        }
    }

    pub fn validation_field(field: &str, message: impl Into<String>) -> Self {
        let mut errors = FieldErrors::new();
        errors.add(field, message);
        Self::validation(errors)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let envelope = ErrorEnvelope {
            error: ErrorBody {
                code: self.code.as_str(),
                message: self.message,
                details: self.details,
            },
        };
        (self.code.status_code(), Json(envelope)).into_response()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code.as_str(), self.message)
    }
}

impl std::error::Error for ApiError {}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        tracing::error!(error = %err, "Document store request failed");
        match err {
            StoreError::Unavailable(_) => ApiError::new(
                ErrorCode::ServiceUnavailable,
                "The document store is unavailable, try again",
            ),
            StoreError::Rejected { status, .. } => ApiError::new(
                ErrorCode::StoreRejected,
                format!("The document store rejected the request ({})", status),
            ),
            StoreError::Decode(_) => ApiError::new(
                ErrorCode::StoreRejected,
                "The document store returned an unreadable response",
            ),
        }
    }
}

impl From<CollectionError> for ApiError {
    fn from(err: CollectionError) -> Self {
        match err {
            CollectionError::ValidationFailed(errors) => ApiError::validation(errors),
            CollectionError::NotFound { kind, id } => {
                ApiError::not_found(format!("{} not found: {}", kind, id))
            }
            CollectionError::StoreUnavailable(e) => e.into(),
            CollectionError::InvalidPatch(reason) => ApiError::bad_request(reason),
            CollectionError::Encode(e) => {
                tracing::error!(error = %e, "Failed to encode record");
                ApiError::internal("Failed to encode record")
            }
        }
    }
}

impl From<FieldErrors> for ApiError {
    fn from(errors: FieldErrors) -> Self {
        ApiError::validation(errors)
    }
}
