//! JWT Authentication Middleware and Claims Propagation
//!
//! Validates bearer tokens on incoming calls, exposes the verified claims to
//! handlers, and attaches tokens to outgoing calls so identity follows a
//! request across service boundaries.
//!
//! ## Core Components
//!
//! - **Claims**: registered claims plus an open map of domain fields
//! - **AuthPolicy**: required flag, exclusion prefixes, auto-parse, signing method and keys
//! - **ServerAuthLayer / JwtServerInterceptor**: validate incoming tokens
//! - **ClientAuthLayer / JwtClientInterceptor**: attach outgoing tokens
//! - **Context**: typed claims and raw-token channels for one call
//!
//! ## Usage Example
//!
//! ### Server Side
//!
//! ```rust,ignore
//! use jwt_auth::{AuthPolicy, JwtServerInterceptor, OperationLayer};
//!
//! let policy = AuthPolicy::with_secret(secret)
//!     .required(true)
//!     .excludes("/grpc.health.v1.Health/");
//!
//! Server::builder()
//!     .layer(OperationLayer)
//!     .add_service(ContentServiceServer::with_interceptor(
//!         service,
//!         JwtServerInterceptor::new(policy),
//!     ))
//!     .serve(addr)
//!     .await?;
//! ```
//!
//! ### Forwarding identity downstream
//!
//! ```rust,ignore
//! use jwt_auth::{outgoing_metadata, JwtClaimsExt};
//!
//! async fn get_feed(&self, request: Request<FeedRequest>) -> Result<Response<Feed>, Status> {
//!     let claims = request.jwt_claims()?;
//!     let ctx = request.auth_context();
//!
//!     let mut outgoing = Request::new(PostsRequest { author: claims.subject.clone() });
//!     *outgoing.metadata_mut() = outgoing_metadata(&ctx, &self.policy)?;
//!     let posts = self.posts.list(outgoing).await?;
//!     // ...
//! }
//! ```
//!
//! ## Security Guarantees
//!
//! - A token's `alg` must equal the configured signing method
//! - Expiration is checked with zero leeway; `iat` may not be in the future
//! - Every decode yields fresh claims; nothing is shared between calls

mod claims;
mod client;
mod codec;
mod context;
mod error;
mod extensions;
mod key;
mod policy;
mod server;
mod transport;

pub use claims::{Claims, EMAIL_CLAIM, REGISTERED_CLAIMS};
pub use client::{generate_token, outgoing_metadata, ClientAuth, ClientAuthLayer, JwtClientInterceptor};
pub use codec::{decode, encode, generate_access_token, TokenHeader, ACCESS_TOKEN_EXPIRY_HOURS};
pub use context::{Call, Context};
pub use error::{AuthError, REASON};
pub use extensions::JwtClaimsExt;
pub use key::{KeyResolver, KeySource, RsaKeyResolver, SecretKeyResolver};
pub use policy::{AuthPolicy, ClaimsFactory};
pub use server::{authenticate, parse_bearer, Authenticated, JwtServerInterceptor, ServerAuth, ServerAuthLayer};
pub use transport::{Kind, Operation, OperationLayer, OperationService, Transport};

// Re-export for callers selecting a signing method
pub use jsonwebtoken::Algorithm;
pub use tonic::Status;
