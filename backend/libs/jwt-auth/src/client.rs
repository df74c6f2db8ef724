//! Client-side token issuing
//!
//! Attaches `Authorization: Bearer <token>` to outgoing calls. A token
//! already present in the call's [`Context`] is forwarded verbatim;
//! otherwise a fresh one is minted from the policy's claims factory.

use std::sync::Arc;
use std::task::{Context as TaskContext, Poll};

use futures::future::{self, Either, Ready};
use http::header::AUTHORIZATION;
use http::HeaderValue;
use secrecy::SecretString;
use tonic::metadata::{AsciiMetadataValue, MetadataMap};
use tonic::service::Interceptor;
use tonic::{Request, Status};
use tower::{Layer, Service};
use tracing::{debug, error, warn};

use crate::codec;
use crate::context::{Call, Context};
use crate::error::AuthError;
use crate::policy::AuthPolicy;

fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}

/// Token to send: the context's raw token, or a newly minted one
fn outgoing_token(raw_token: Option<&str>, policy: &AuthPolicy) -> Result<String, AuthError> {
    match raw_token {
        Some(token) => Ok(token.to_string()),
        None => {
            let token = codec::encode(&policy.new_claims(), policy)?;
            debug!("Minted token for outgoing call");
            Ok(token)
        }
    }
}

fn attach(ctx: &mut Context, policy: &AuthPolicy) -> Result<(), AuthError> {
    let Some(transport) = ctx.client.as_mut() else {
        error!("Client authentication requires a client transport");
        return Err(AuthError::WrongContext);
    };

    let token = outgoing_token(ctx.raw_token.as_deref(), policy)?;
    let value = HeaderValue::try_from(bearer(&token)).map_err(|_| {
        warn!("Token is not a valid header value");
        AuthError::TokenInvalid
    })?;

    transport.request_header_mut().insert(AUTHORIZATION, value);
    Ok(())
}

/// gRPC metadata carrying the context's identity to another process
///
/// Same token choice as [`ClientAuthLayer`], without needing a client
/// transport in the context.
///
/// ## Errors
///
/// - [`AuthError::NeedTokenProvider`] if minting is needed and the policy has no key source
/// - [`AuthError::GetKey`] if the key resolver refuses to produce a signing key,
///   including a resolver that rejects the policy's algorithm; such a resolver
///   reports [`AuthError::MissingKeyFunc`] itself, which is not passed through
/// - [`AuthError::SignToken`] if the signature cannot be computed
pub fn outgoing_metadata(ctx: &Context, policy: &AuthPolicy) -> Result<MetadataMap, AuthError> {
    let token = outgoing_token(ctx.raw_token(), policy)?;
    let value = AsciiMetadataValue::try_from(bearer(&token)).map_err(|_| {
        warn!("Token is not a valid metadata value");
        AuthError::TokenInvalid
    })?;

    let mut metadata = MetadataMap::new();
    metadata.insert("authorization", value);
    Ok(metadata)
}

/// Mint a 24-hour HS256 token for `user_id` and store it as the context's
/// raw token
///
/// Outgoing calls made with the returned context forward that token.
pub fn generate_token(
    ctx: Context,
    user_id: &str,
    secret: &SecretString,
) -> Result<Context, AuthError> {
    let token = codec::generate_access_token(user_id, secret)?;
    Ok(ctx.with_raw_token(token))
}

/// Tower layer attaching bearer tokens to outgoing [`Call`]s
#[derive(Debug, Clone)]
pub struct ClientAuthLayer {
    policy: Arc<AuthPolicy>,
}

impl ClientAuthLayer {
    pub fn new(policy: AuthPolicy) -> Self {
        Self {
            policy: Arc::new(policy),
        }
    }

    pub fn policy(&self) -> &AuthPolicy {
        &self.policy
    }
}

impl<S> Layer<S> for ClientAuthLayer {
    type Service = ClientAuth<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ClientAuth {
            inner,
            policy: self.policy.clone(),
        }
    }
}

/// Service produced by [`ClientAuthLayer`]
#[derive(Debug, Clone)]
pub struct ClientAuth<S> {
    inner: S,
    policy: Arc<AuthPolicy>,
}

impl<S, Req> Service<Call<Req>> for ClientAuth<S>
where
    S: Service<Call<Req>>,
    S::Error: From<AuthError>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Either<Ready<Result<S::Response, S::Error>>, S::Future>;

    fn poll_ready(&mut self, cx: &mut TaskContext<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut call: Call<Req>) -> Self::Future {
        match attach(&mut call.ctx, &self.policy) {
            Ok(()) => Either::Right(self.inner.call(call)),
            Err(e) => {
                warn!(error = %e, "Outgoing call aborted");
                Either::Left(future::ready(Err(e.into())))
            }
        }
    }
}

#[derive(Clone)]
enum Credential {
    /// Pre-formatted authorization header value
    Fixed(AsciiMetadataValue),
    /// Mint per request
    Mint(Arc<AuthPolicy>),
}

/// Client-side interceptor that injects JWT tokens into gRPC metadata
///
/// Either forwards one fixed token (gateway style) or mints a fresh token
/// for every request from a policy.
///
/// ## Usage
///
/// ```rust,no_run
/// use jwt_auth::JwtClientInterceptor;
/// use tonic::transport::Channel;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let jwt_token = "eyJhbGc..."; // From authentication
/// let interceptor = JwtClientInterceptor::new(jwt_token)?;
///
/// let channel = Channel::from_static("http://[::1]:50051")
///     .connect()
///     .await?;
///
/// // let mut client = SomeServiceClient::with_interceptor(channel, interceptor);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct JwtClientInterceptor {
    credential: Credential,
}

impl std::fmt::Debug for JwtClientInterceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mode = match self.credential {
            Credential::Fixed(_) => "fixed",
            Credential::Mint(_) => "mint",
        };
        f.debug_struct("JwtClientInterceptor")
            .field("mode", &mode)
            .finish()
    }
}

impl JwtClientInterceptor {
    /// Forward one token on every request
    ///
    /// ## Errors
    ///
    /// Returns [`AuthError::TokenInvalid`] if the token is not valid ASCII
    /// metadata. Compact JWS strings always are.
    pub fn new(jwt_token: impl Into<String>) -> Result<Self, AuthError> {
        let auth_header = AsciiMetadataValue::try_from(bearer(&jwt_token.into()))
            .map_err(|_| AuthError::TokenInvalid)?;
        Ok(Self::from_header(auth_header))
    }

    /// Forward an already parsed authorization header
    pub fn from_header(auth_header: AsciiMetadataValue) -> Self {
        Self {
            credential: Credential::Fixed(auth_header),
        }
    }

    /// Mint a fresh token for every request
    pub fn minting(policy: AuthPolicy) -> Self {
        Self {
            credential: Credential::Mint(Arc::new(policy)),
        }
    }

    /// Forward the context's raw token, or mint when it has none
    pub fn from_context(ctx: &Context, policy: AuthPolicy) -> Result<Self, AuthError> {
        match ctx.raw_token() {
            Some(token) => Self::new(token),
            None => Ok(Self::minting(policy)),
        }
    }

    /// Authorization header of an incoming request, for forwarding
    pub fn extract_from_metadata(metadata: &MetadataMap) -> Result<&AsciiMetadataValue, Status> {
        metadata
            .get("authorization")
            .ok_or_else(|| AuthError::MissingJwtToken.into())
    }
}

impl Interceptor for JwtClientInterceptor {
    fn call(&mut self, mut request: Request<()>) -> Result<Request<()>, Status> {
        let auth_header = match &self.credential {
            Credential::Fixed(value) => value.clone(),
            Credential::Mint(policy) => {
                let token = outgoing_token(None, policy)?;
                AsciiMetadataValue::try_from(bearer(&token))
                    .map_err(|_| Status::from(AuthError::SignToken))?
            }
        };

        request.metadata_mut().insert("authorization", auth_header);
        Ok(request)
    }
}
