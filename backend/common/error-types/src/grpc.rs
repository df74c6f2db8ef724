//! gRPC-specific error handling
//!
//! Attaches the stable error key to outgoing statuses so clients can branch
//! on it without parsing messages.

use tonic::metadata::MetadataValue;
use tonic::Status;

/// Metadata key carrying the [`StatusError`](crate::StatusError) key
pub const ERROR_CODE_METADATA: &str = "x-error-code";

/// Extension trait for adding metadata to gRPC Status
pub trait StatusExt {
    /// Add error code for client handling
    ///
    /// Codes that are not valid ASCII metadata are dropped.
    fn with_error_code(self, code: &str) -> Self;

    /// Read back the error code, if one was attached
    fn error_code(&self) -> Option<&str>;
}

impl StatusExt for Status {
    fn with_error_code(mut self, code: &str) -> Self {
        match MetadataValue::try_from(code) {
            Ok(value) => {
                self.metadata_mut().insert(ERROR_CODE_METADATA, value);
            }
            Err(e) => {
                tracing::debug!(error = %e, "Skipping non-ASCII error code");
            }
        }
        self
    }

    fn error_code(&self) -> Option<&str> {
        self.metadata()
            .get(ERROR_CODE_METADATA)
            .and_then(|value| value.to_str().ok())
    }
}
