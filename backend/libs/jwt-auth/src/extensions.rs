//! Request Extension Trait for JWT Claims Access
//!
//! Provides ergonomic helpers for accessing JWT claims from gRPC request handlers.

use std::sync::Arc;

use tonic::{Request, Status};

use crate::claims::Claims;
use crate::context::Context;
use crate::transport::Transport;

/// Verified token string stored next to the claims
#[derive(Debug, Clone)]
pub(crate) struct RawToken(pub(crate) String);

/// Extension trait for accessing JWT claims from gRPC requests
///
/// Implemented for all `Request<T>` types; reads what
/// [`JwtServerInterceptor`](crate::JwtServerInterceptor) stored.
///
/// ## Usage
///
/// ```rust,no_run
/// use jwt_auth::JwtClaimsExt;
/// use tonic::{Request, Response, Status};
///
/// async fn delete_post(request: Request<()>) -> Result<Response<()>, Status> {
///     let post_author = "123456789"; // From database
///     request.require_subject(post_author)?;
///
///     Ok(Response::new(()))
/// }
/// ```
pub trait JwtClaimsExt {
    /// Verified claims of the caller
    ///
    /// ## Errors
    ///
    /// `Status::unauthenticated` if the call was let through anonymously or
    /// no interceptor is attached.
    fn jwt_claims(&self) -> Result<&Claims, Status>;

    /// Token string the claims were verified from
    fn raw_token(&self) -> Option<&str>;

    /// Require that the caller is the given principal
    ///
    /// ## Errors
    ///
    /// - `Status::unauthenticated` if no JWT claims found
    /// - `Status::permission_denied` if the subject differs
    fn require_subject(&self, subject: &str) -> Result<&Claims, Status>;

    /// Execution context carrying this request's identity
    ///
    /// Handlers pass it to [`ClientAuthLayer`](crate::ClientAuthLayer) or
    /// [`outgoing_metadata`](crate::outgoing_metadata) so downstream calls
    /// forward the caller's token.
    fn auth_context(&self) -> Context;
}

impl<T> JwtClaimsExt for Request<T> {
    fn jwt_claims(&self) -> Result<&Claims, Status> {
        self.extensions()
            .get::<Arc<Claims>>()
            .map(Arc::as_ref)
            .ok_or_else(|| {
                Status::unauthenticated(
                    "No JWT claims found. Ensure JwtServerInterceptor is attached.",
                )
            })
    }

    fn raw_token(&self) -> Option<&str> {
        self.extensions()
            .get::<RawToken>()
            .map(|token| token.0.as_str())
    }

    fn require_subject(&self, subject: &str) -> Result<&Claims, Status> {
        let claims = self.jwt_claims()?;

        if !claims.is_subject(subject) {
            return Err(Status::permission_denied(
                "You do not have permission to access this resource",
            ));
        }

        Ok(claims)
    }

    fn auth_context(&self) -> Context {
        let mut ctx = Context::server(Transport::from_grpc_request(self));
        if let Some(claims) = self.extensions().get::<Arc<Claims>>() {
            ctx.claims = Some(claims.clone());
        }
        if let Some(token) = self.raw_token() {
            ctx.raw_token = Some(token.to_string());
        }
        ctx
    }
}
