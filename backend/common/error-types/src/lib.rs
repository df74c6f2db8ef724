//! Unified status errors for go-core services
//!
//! Every service boundary reports failures as a [`StatusError`]: a numeric
//! status code, a stable machine-readable key and a human-readable message.
//! The same value converts into a gRPC [`tonic::Status`] or an HTTP response
//! body, so handlers never build transport errors by hand.
//!
//! # Design Principles
//!
//! 1. **Stable keys**: clients branch on `key`, never on `message`
//! 2. **One taxonomy**: HTTP and gRPC surfaces share the same error values
//! 3. **Observability**: errors log themselves at a level matching their class

use http::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tonic::{Code, Status};

pub mod grpc;
pub mod http_response;

pub use grpc::StatusExt;
pub use http_response::HttpErrorResponse;

/// Key for malformed requests
pub const BAD_REQUEST: &str = "BAD_REQUEST_ERROR";
/// Key for a successful operation
pub const SUCCESS: &str = "SUCCESS";
/// Fallback message when no source error is available
pub const ERROR: &str = "ERROR";
/// Key for unexpected server failures
pub const INTERNAL_SERVER_ERROR: &str = "INTERNAL_SERVER_ERROR";
/// Key for missing resources
pub const NOT_FOUND: &str = "NOT_FOUND_ERROR";
/// Key for input that failed validation
pub const INPUT_PARAM_INVALID: &str = "INPUT_PARAM_INVALID";
/// Key for authenticated callers lacking permission
pub const FORBIDEN_ERROR: &str = "FORBIDEN_ERROR";
/// Key for missing or invalid credentials
pub const UNAUTHORIZED_ERROR: &str = "UNAUTHORIZED_ERROR";

/// Response-level result code for failures
pub const ERROR_CODE: i64 = 1;
/// Response-level result code for success
pub const SUCCESS_CODE: i64 = 0;

/// Status error carried across service boundaries
///
/// `code` holds the HTTP status number (400, 401, ...), `key` one of the
/// constants above.
///
/// # Example
/// ```rust
/// use error_types::StatusError;
///
/// let err = StatusError::not_found("user 42 does not exist");
/// assert_eq!(err.code, 404);
/// assert_eq!(err.key, error_types::NOT_FOUND);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct StatusError {
    /// HTTP status number
    pub code: u16,

    /// Machine-readable error key
    pub key: String,

    /// Human-readable message
    pub message: String,
}

impl StatusError {
    /// Build a status error from a code, a key and an optional message
    ///
    /// A missing message falls back to [`ERROR`].
    pub fn new(code: StatusCode, key: &str, message: Option<String>) -> Self {
        Self {
            code: code.as_u16(),
            key: key.to_string(),
            message: message.unwrap_or_else(|| ERROR.to_string()),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, BAD_REQUEST, Some(message.into()))
    }

    pub fn param_invalid(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, INPUT_PARAM_INVALID, Some(message.into()))
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            INTERNAL_SERVER_ERROR,
            Some(message.into()),
        )
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, NOT_FOUND, Some(message.into()))
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, FORBIDEN_ERROR, Some(message.into()))
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, UNAUTHORIZED_ERROR, Some(message.into()))
    }

    /// HTTP status for this error
    ///
    /// Codes outside the valid HTTP range map to 500.
    pub fn http_status(&self) -> StatusCode {
        StatusCode::from_u16(self.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// Convert to gRPC Status for service boundaries
    pub fn to_status(&self) -> Status {
        let code = match self.http_status() {
            StatusCode::BAD_REQUEST => Code::InvalidArgument,
            StatusCode::UNAUTHORIZED => Code::Unauthenticated,
            StatusCode::FORBIDDEN => Code::PermissionDenied,
            StatusCode::NOT_FOUND => Code::NotFound,
            StatusCode::CONFLICT => Code::AlreadyExists,
            StatusCode::TOO_MANY_REQUESTS => Code::ResourceExhausted,
            StatusCode::SERVICE_UNAVAILABLE => Code::Unavailable,
            StatusCode::GATEWAY_TIMEOUT => Code::DeadlineExceeded,
            _ => Code::Internal,
        };

        Status::new(code, self.message.clone()).with_error_code(&self.key)
    }

    /// Log error with appropriate level and context
    pub fn log(&self) {
        match self.http_status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                tracing::warn!(key = %self.key, message = %self.message, "Authorization failure");
            }
            status if status.is_server_error() => {
                tracing::error!(key = %self.key, message = %self.message, "Server error");
            }
            _ => {
                tracing::debug!(key = %self.key, message = %self.message, "Client error");
            }
        }
    }
}

impl From<StatusError> for Status {
    fn from(error: StatusError) -> Self {
        error.to_status()
    }
}

/// Result type alias for operations reporting [`StatusError`]
pub type StatusResult<T> = Result<T, StatusError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors_set_code_and_key() {
        let cases = [
            (StatusError::bad_request("x"), 400, BAD_REQUEST),
            (StatusError::param_invalid("x"), 400, INPUT_PARAM_INVALID),
            (StatusError::internal("x"), 500, INTERNAL_SERVER_ERROR),
            (StatusError::not_found("x"), 404, NOT_FOUND),
            (StatusError::forbidden("x"), 403, FORBIDEN_ERROR),
            (StatusError::unauthorized("x"), 401, UNAUTHORIZED_ERROR),
        ];

        for (error, code, key) in cases {
            assert_eq!(error.code, code);
            assert_eq!(error.key, key);
            assert_eq!(error.message, "x");
        }
    }

    #[test]
    fn test_missing_message_falls_back() {
        let error = StatusError::new(StatusCode::BAD_REQUEST, BAD_REQUEST, None);
        assert_eq!(error.message, ERROR);
        assert_eq!(error.to_string(), ERROR);
    }

    #[test]
    fn test_error_to_status_conversion() {
        let status = StatusError::unauthorized("JWT token is missing").to_status();
        assert_eq!(status.code(), Code::Unauthenticated);
        assert_eq!(status.message(), "JWT token is missing");
        assert_eq!(
            status.metadata().get("x-error-code").unwrap().to_str().unwrap(),
            UNAUTHORIZED_ERROR
        );

        let status: Status = StatusError::not_found("post").into();
        assert_eq!(status.code(), Code::NotFound);
    }

    #[test]
    fn test_out_of_range_code_is_internal() {
        let error = StatusError {
            code: 42,
            key: ERROR.to_string(),
            message: "odd".to_string(),
        };
        assert_eq!(error.http_status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(error.to_status().code(), Code::Internal);
    }
}
