//! Authentication error taxonomy
//!
//! Every failure the middleware can produce is terminal at this layer: the
//! value is handed back to the caller unchanged and retries, if any, belong
//! to whoever issued the call.

use error_types::{StatusError, StatusExt};
use thiserror::Error;
use tonic::Status;

/// Reason attached to every authentication failure
pub const REASON: &str = "UNAUTHORIZED";

/// Errors raised while validating or issuing tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthError {
    /// Header absent, wrong scheme word, or malformed "Bearer" prefix
    #[error("JWT token is missing")]
    MissingJwtToken,

    /// No key source configured, or the resolver refused the token's algorithm
    #[error("keyFunc is missing")]
    MissingKeyFunc,

    /// Bad signature, structural parse failure, or algorithm mismatch
    #[error("Token is invalid")]
    TokenInvalid,

    /// Valid signature, expiry timestamp in the past
    #[error("JWT token has expired")]
    TokenExpired,

    /// Signed payload that does not decode into claims
    #[error("Fail to parse JWT token")]
    TokenParseFail,

    /// Token algorithm differs from the configured signing method
    #[error("Wrong signing method")]
    UnsupportedSigningMethod,

    /// The call context carries no transport headers
    #[error("Wrong context for middleware")]
    WrongContext,

    /// Minting requested without any key source
    #[error("Token provider is missing")]
    NeedTokenProvider,

    /// Signature computation failed while minting
    #[error("Can not sign token. Is the key correct?")]
    SignToken,

    /// Key resolution failed while minting
    #[error("Can not get key while signing token")]
    GetKey,
}

impl AuthError {
    /// Whether the failure is an integration bug rather than a credential problem
    pub fn is_integration_error(&self) -> bool {
        matches!(self, Self::WrongContext)
    }

    /// Convert to gRPC Status for service boundaries
    ///
    /// Credential failures become `Unauthenticated`; a missing transport
    /// context is a wiring bug and becomes `Internal`.
    pub fn to_status(&self) -> Status {
        let status = if self.is_integration_error() {
            Status::internal(self.to_string())
        } else {
            Status::unauthenticated(self.to_string())
        };
        status.with_error_code(REASON)
    }
}

impl From<AuthError> for Status {
    fn from(error: AuthError) -> Self {
        error.to_status()
    }
}

impl From<AuthError> for StatusError {
    fn from(error: AuthError) -> Self {
        StatusError::unauthorized(error.to_string())
    }
}
