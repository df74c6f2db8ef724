//! HTTP error response handling
//!
//! Provides the JSON body returned by REST handlers for a [`StatusError`].

use serde::{Deserialize, Serialize};

use crate::{StatusError, ERROR_CODE};

/// Standard HTTP error response format
#[derive(Debug, Serialize, Deserialize)]
pub struct HttpErrorResponse {
    /// Response-level result code (always [`ERROR_CODE`] for errors)
    pub code: i64,

    /// HTTP status code
    pub status: u16,

    /// Error key for client handling
    pub key: String,

    /// Human-readable error message
    pub message: String,
}

impl From<&StatusError> for HttpErrorResponse {
    fn from(error: &StatusError) -> Self {
        Self {
            code: ERROR_CODE,
            status: error.http_status().as_u16(),
            key: error.key.clone(),
            message: error.message.clone(),
        }
    }
}

impl StatusError {
    /// Render as the JSON body of an HTTP error response
    pub fn to_http_body(&self) -> serde_json::Value {
        serde_json::json!(HttpErrorResponse::from(self))
    }
}
