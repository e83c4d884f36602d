// cirrus-server/src/error.rs
// ============================================================================
// Module: API Error Mapping
// Description: The one place where tagged core errors become status codes.
// Purpose: Map store and query errors onto the wire error envelope without
//          leaking internals.
// Dependencies: axum, cirrus-core, cirrus-query, serde_json
// ============================================================================

//! ## Overview
//! `ApiError` is the boundary type: every handler failure flows through it
//! and is rendered as the service's documented `{"code": …, "message": …}`
//! envelope. Internal errors are logged with full context by the caller and
//! surfaced with a generic body; nothing below the boundary ever inspects a
//! status code.

// ============================================================================
// SECTION: Imports
// ============================================================================

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use cirrus_core::StoreError;
use cirrus_query::QueryError;
use serde_json::json;

use crate::envelope;

// ============================================================================
// SECTION: Error Type
// ============================================================================

/// Boundary error carrying the wire status and envelope fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    /// HTTP status for the response.
    pub status: StatusCode,
    /// Stable error code string.
    pub code: &'static str,
    /// Human-readable message for the envelope body.
    pub message: String,
}

impl ApiError {
    /// Builds a 400 with the `BadRequest` code.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code: "BadRequest",
            message: message.into(),
        }
    }

    /// Builds a 401 with the `Unauthorized` code.
    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            code: "Unauthorized",
            message: message.into(),
        }
    }

    /// Builds a 408 with the `RequestTimeout` code.
    #[must_use]
    pub fn timeout() -> Self {
        Self {
            status: StatusCode::REQUEST_TIMEOUT,
            code: "RequestTimeout",
            message: "the request exceeded the configured server timeout".to_string(),
        }
    }

    /// Builds a 500 with a generic body; detail belongs in the server log.
    #[must_use]
    pub fn internal() -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: "InternalServerError",
            message: "an internal error occurred".to_string(),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(error: StoreError) -> Self {
        let (status, code) = match &error {
            StoreError::NotFound(_) => (StatusCode::NOT_FOUND, "NotFound"),
            StoreError::AlreadyExists(_) => (StatusCode::CONFLICT, "Conflict"),
            StoreError::PreconditionFailed(_) => {
                (StatusCode::PRECONDITION_FAILED, "PreconditionFailed")
            }
            StoreError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BadRequest"),
            StoreError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "Unauthorized"),
            StoreError::PayloadTooLarge {
                ..
            } => (StatusCode::PAYLOAD_TOO_LARGE, "RequestEntityTooLarge"),
            StoreError::Internal(_) => {
                return Self::internal();
            }
        };
        Self {
            status,
            code,
            message: error.to_string(),
        }
    }
}

impl From<QueryError> for ApiError {
    fn from(error: QueryError) -> Self {
        match &error {
            QueryError::Cancelled => Self::timeout(),
            QueryError::Internal(_) => Self::internal(),
            _ => Self {
                status: StatusCode::BAD_REQUEST,
                code: "BadRequest",
                message: error.to_string(),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        envelope::json_response(
            self.status,
            &json!({
                "code": self.code,
                "message": self.message,
            }),
        )
    }
}

/// Result alias for handler bodies.
pub type ApiResult<T> = Result<T, ApiError>;
