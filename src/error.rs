//! Gateway error types.
//!
//! [`GatewayError`] is returned by the resource collaborators and the REST
//! layer; each variant maps to an HTTP status code and a structured JSON
//! error response. [`StreamError`] covers the duplex stream and RPC layers,
//! where failures are logged and contained to one message or one call.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::domain::SelectorError;

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 2001,
///     "message": "widgets \"w-1\" not found"
///   }
/// }
/// ```
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ErrorBody {
    /// Numeric error code.
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
}

/// Resource access failure.
///
/// # Error Code Ranges
///
/// | Range     | Category        | HTTP Status                  |
/// |-----------|-----------------|------------------------------|
/// | 1000–1999 | Validation      | 400 Bad Request              |
/// | 2000–2999 | State/Not Found | 404 Not Found / 409 Conflict |
/// | 3000–3999 | Server          | 500 Internal Server Error    |
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    /// Object with the given name does not exist.
    #[error("{collection} {name:?} not found")]
    NotFound {
        /// Collection that was searched.
        collection: String,
        /// Requested object name.
        name: String,
    },

    /// Object with the given name already exists.
    #[error("{collection} {name:?} already exists")]
    AlreadyExists {
        /// Target collection.
        collection: String,
        /// Conflicting object name.
        name: String,
    },

    /// Optimistic concurrency check failed.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Request validation failed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Collection name was empty or malformed.
    #[error("invalid collection: {0:?}")]
    InvalidCollection(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Returns `true` for the distinguishable not-found kind.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidRequest(_) => 1001,
            Self::InvalidCollection(_) => 1002,
            Self::NotFound { .. } => 2001,
            Self::AlreadyExists { .. } => 2002,
            Self::Conflict(_) => 2003,
            Self::Internal(_) => 3000,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) | Self::InvalidCollection(_) => StatusCode::BAD_REQUEST,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::AlreadyExists { .. } | Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<SelectorError> for GatewayError {
    fn from(err: SelectorError) -> Self {
        Self::InvalidRequest(err.to_string())
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
            },
        };
        (status, axum::Json(body)).into_response()
    }
}

/// Failure inside the duplex stream or RPC layers.
///
/// None of these are fatal to a session; the session only ends on
/// transport failure, which is handled by the connection itself.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// A message or call payload could not be decoded, or a reply could
    /// not be encoded.
    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),

    /// The reply sink was closed because the session ended.
    #[error("reply sink closed")]
    ReplySinkClosed,

    /// A handler received a call for a method it does not serve.
    #[error("call has been misdispatched to {0}")]
    Misdispatched(String),

    /// A collaborator call failed.
    #[error(transparent)]
    Collaborator(#[from] GatewayError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_is_distinguishable() {
        let err = GatewayError::NotFound {
            collection: "widgets".to_string(),
            name: "w-1".to_string(),
        };
        assert!(err.is_not_found());
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(err.to_string(), "widgets \"w-1\" not found");
        assert!(!GatewayError::Internal("boom".to_string()).is_not_found());
    }

    #[test]
    fn status_codes_by_category() {
        assert_eq!(
            GatewayError::InvalidRequest(String::new()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            GatewayError::Conflict(String::new()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            GatewayError::Internal(String::new()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn selector_errors_become_invalid_requests() {
        let err: GatewayError = SelectorError::EmptyKey("=x".to_string()).into();
        assert_eq!(err.error_code(), 1001);
    }
}
