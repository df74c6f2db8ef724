//! Server-side authentication
//!
//! Validates the bearer token of incoming calls under an [`AuthPolicy`] and
//! exposes the verified claims to the handler.
//!
//! ## Decision order
//!
//! 1. With `auto_parse`, the token is decoded first and the outcome kept
//! 2. Not `required`: the call proceeds, with claims if a parse succeeded
//! 3. Operation matches an exclusion prefix: the call proceeds likewise
//! 4. A kept parse failure rejects the call without decoding again
//! 5. Otherwise the token is decoded now; failure rejects the call
//!
//! A rejected call never reaches the handler and its context is untouched.

use std::sync::Arc;
use std::task::{Context as TaskContext, Poll};

use config_core::AuthConfig;
use futures::future::{self, Either, Ready};
use http::header::AUTHORIZATION;
use http::HeaderMap;
use tonic::service::Interceptor;
use tonic::{Request, Status};
use tower::{Layer, Service};
use tracing::{debug, error, warn};

use crate::claims::Claims;
use crate::codec;
use crate::context::Call;
use crate::error::AuthError;
use crate::extensions::RawToken;
use crate::policy::AuthPolicy;
use crate::transport::Transport;

const BEARER_WORD: &str = "Bearer";

/// Outcome of a successful token validation
#[derive(Debug, Clone)]
pub struct Authenticated {
    pub claims: Arc<Claims>,
    pub token: String,
}

/// Extract the token from an `Authorization: Bearer <token>` header
///
/// The value must split on single spaces into exactly two parts: the scheme
/// word (case-insensitive) and a non-empty token.
pub fn parse_bearer(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or(AuthError::MissingJwtToken)?;

    let mut parts = value.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(scheme), Some(token), None)
            if scheme.eq_ignore_ascii_case(BEARER_WORD) && !token.is_empty() =>
        {
            Ok(token)
        }
        _ => Err(AuthError::MissingJwtToken),
    }
}

fn verify(policy: &AuthPolicy, headers: &HeaderMap) -> Result<Authenticated, AuthError> {
    let token = parse_bearer(headers)?;
    let claims = codec::decode(token, policy)?;
    Ok(Authenticated {
        claims: Arc::new(claims),
        token: token.to_string(),
    })
}

/// Apply a policy to one incoming call
///
/// `Ok(None)` lets the call through anonymously.
pub fn authenticate(
    policy: &AuthPolicy,
    operation: &str,
    headers: &HeaderMap,
) -> Result<Option<Authenticated>, AuthError> {
    let attempt = policy.auto_parse.then(|| verify(policy, headers));

    if !policy.required {
        return Ok(attempt.and_then(Result::ok));
    }

    if policy.is_excluded(operation) {
        debug!(operation, "Operation excluded from authentication");
        return Ok(attempt.and_then(Result::ok));
    }

    match attempt {
        Some(result) => result.map(Some),
        None => verify(policy, headers).map(Some),
    }
}

fn authenticate_transport(
    policy: &AuthPolicy,
    transport: Option<&Transport>,
) -> Result<Option<Authenticated>, AuthError> {
    let Some(transport) = transport else {
        error!("Server authentication requires a server transport");
        return Err(AuthError::WrongContext);
    };

    let operation = transport.operation();
    match authenticate(policy, operation, transport.request_header()) {
        Ok(outcome) => {
            if let Some(auth) = &outcome {
                debug!(operation, subject = ?auth.claims.subject, "JWT validated successfully");
            }
            Ok(outcome)
        }
        Err(e) => {
            warn!(operation, error = %e, "Rejected unauthenticated call");
            Err(e)
        }
    }
}

/// Tower layer validating tokens of incoming [`Call`]s
///
/// ## Usage
///
/// ```rust,ignore
/// let service = ServiceBuilder::new()
///     .layer(ServerAuthLayer::new(AuthPolicy::with_secret(secret).required(true)))
///     .service(handler);
/// ```
#[derive(Debug, Clone)]
pub struct ServerAuthLayer {
    policy: Arc<AuthPolicy>,
}

impl ServerAuthLayer {
    pub fn new(policy: AuthPolicy) -> Self {
        Self {
            policy: Arc::new(policy),
        }
    }

    /// Build from the service's `auth` configuration section
    pub fn from_config(config: &AuthConfig) -> Result<Self, config_core::ConfigError> {
        AuthPolicy::from_config(config).map(Self::new)
    }

    pub fn policy(&self) -> &AuthPolicy {
        &self.policy
    }
}

impl<S> Layer<S> for ServerAuthLayer {
    type Service = ServerAuth<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ServerAuth {
            inner,
            policy: self.policy.clone(),
        }
    }
}

/// Service produced by [`ServerAuthLayer`]
#[derive(Debug, Clone)]
pub struct ServerAuth<S> {
    inner: S,
    policy: Arc<AuthPolicy>,
}

impl<S, Req> Service<Call<Req>> for ServerAuth<S>
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
        match authenticate_transport(&self.policy, call.ctx.server_transport()) {
            Ok(Some(auth)) => {
                call.ctx.authenticate(auth.claims, auth.token);
                Either::Right(self.inner.call(call))
            }
            Ok(None) => Either::Right(self.inner.call(call)),
            Err(e) => Either::Left(future::ready(Err(e.into()))),
        }
    }
}

/// tonic interceptor validating tokens of incoming requests
///
/// On success the claims are stored in request extensions as
/// `Arc<Claims>`, read back through [`JwtClaimsExt`](crate::JwtClaimsExt).
/// Exclusion prefixes only match when the server also runs
/// [`OperationLayer`](crate::OperationLayer).
///
/// ## Usage
///
/// ```rust,ignore
/// let interceptor = JwtServerInterceptor::new(policy);
/// Server::builder()
///     .layer(OperationLayer)
///     .add_service(ContentServiceServer::with_interceptor(service, interceptor))
///     .serve(addr)
///     .await?;
/// ```
#[derive(Debug, Clone)]
pub struct JwtServerInterceptor {
    policy: Arc<AuthPolicy>,
}

impl JwtServerInterceptor {
    pub fn new(policy: AuthPolicy) -> Self {
        Self {
            policy: Arc::new(policy),
        }
    }

    pub fn from_config(config: &AuthConfig) -> Result<Self, config_core::ConfigError> {
        AuthPolicy::from_config(config).map(Self::new)
    }
}

impl Interceptor for JwtServerInterceptor {
    fn call(&mut self, mut request: Request<()>) -> Result<Request<()>, Status> {
        let transport = Transport::from_grpc_request(&request);

        if let Some(auth) = authenticate_transport(&self.policy, Some(&transport))? {
            request.extensions_mut().insert(auth.claims);
            request.extensions_mut().insert(RawToken(auth.token));
        }

        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use crate::transport::{Kind, Operation};
    use chrono::{Duration, Utc};
    use http::HeaderValue;

    const SECRET: &str = "server-test-secret";

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    fn valid_token() -> String {
        let claims = Claims::new("u1").valid_for(Duration::hours(1));
        codec::encode(&claims, &AuthPolicy::with_secret(SECRET)).unwrap()
    }

    fn expired_token() -> String {
        let claims = Claims::new("u1").expires(Utc::now() - Duration::days(2));
        codec::encode(&claims, &AuthPolicy::with_secret(SECRET)).unwrap()
    }

    #[test]
    fn test_parse_bearer() {
        assert_eq!(parse_bearer(&headers("Bearer abc")), Ok("abc"));
        assert_eq!(parse_bearer(&headers("bearer abc")), Ok("abc"));
        assert_eq!(parse_bearer(&headers("BEARER abc")), Ok("abc"));
    }

    #[test]
    fn test_parse_bearer_rejects_malformed_headers() {
        for value in [
            "Bearer123",
            "Bearer",
            "Bearer ",
            "abc",
            "Basic abc",
            "Bearer a b",
            "Bearer  abc",
            " Bearer abc",
            "",
        ] {
            assert_eq!(
                parse_bearer(&headers(value)),
                Err(AuthError::MissingJwtToken),
                "{value:?}"
            );
        }

        assert_eq!(parse_bearer(&HeaderMap::new()), Err(AuthError::MissingJwtToken));
    }

    #[test]
    fn test_parse_bearer_rejects_opaque_bytes() {
        let mut map = HeaderMap::new();
        map.insert(AUTHORIZATION, HeaderValue::from_bytes(b"Bearer \xfftoken").unwrap());
        assert_eq!(parse_bearer(&map), Err(AuthError::MissingJwtToken));
    }

    #[test]
    fn test_not_required_always_allows() {
        let policy = AuthPolicy::with_secret(SECRET);

        for map in [HeaderMap::new(), headers("garbage"), headers("Bearer 123")] {
            assert!(matches!(authenticate(&policy, "/svc/Op", &map), Ok(None)));
        }
    }

    #[test]
    fn test_not_required_without_auto_parse_ignores_valid_token() {
        let policy = AuthPolicy::with_secret(SECRET);
        let map = headers(&format!("Bearer {}", valid_token()));

        assert!(matches!(authenticate(&policy, "/svc/Op", &map), Ok(None)));
    }

    #[test]
    fn test_not_required_with_auto_parse_attaches_claims() {
        let policy = AuthPolicy::with_secret(SECRET).auto_parse(true);
        let token = valid_token();

        let auth = authenticate(&policy, "/svc/Op", &headers(&format!("Bearer {token}")))
            .unwrap()
            .unwrap();
        assert_eq!(auth.claims.subject.as_deref(), Some("u1"));
        assert_eq!(auth.token, token);

        // A failed optimistic parse is not an error
        let outcome = authenticate(&policy, "/svc/Op", &headers("Bearer 123")).unwrap();
        assert!(outcome.is_none());
    }

    #[test]
    fn test_required_rejections() {
        let policy = AuthPolicy::with_secret(SECRET).required(true);

        let cases = [
            (HeaderMap::new(), AuthError::MissingJwtToken),
            (headers("Bearer123"), AuthError::MissingJwtToken),
            (headers("Bearer 123"), AuthError::TokenInvalid),
            (headers(&format!("Bearer {}", expired_token())), AuthError::TokenExpired),
        ];

        for (map, expected) in cases {
            assert_eq!(authenticate(&policy, "/svc/Op", &map).unwrap_err(), expected);
        }
    }

    #[test]
    fn test_required_accepts_valid_token() {
        let policy = AuthPolicy::with_secret(SECRET).required(true);
        let map = headers(&format!("Bearer {}", valid_token()));

        let auth = authenticate(&policy, "/svc/Op", &map).unwrap().unwrap();
        assert!(auth.claims.is_subject("u1"));
    }

    #[test]
    fn test_excluded_operation_bypasses_required() {
        let policy = AuthPolicy::with_secret(SECRET)
            .required(true)
            .excludes("/helloworld.Greeter/");

        let outcome = authenticate(&policy, "/helloworld.Greeter/SayHello", &HeaderMap::new());
        assert!(matches!(outcome, Ok(None)));

        let outcome = authenticate(&policy, "/other.Service/Call", &HeaderMap::new());
        assert_eq!(outcome.unwrap_err(), AuthError::MissingJwtToken);
    }

    #[test]
    fn test_excluded_operation_keeps_auto_parsed_claims() {
        let policy = AuthPolicy::with_secret(SECRET)
            .required(true)
            .auto_parse(true)
            .excludes("/public");
        let map = headers(&format!("Bearer {}", valid_token()));

        let auth = authenticate(&policy, "/public/feed", &map).unwrap();
        assert!(auth.is_some());
    }

    #[test]
    fn test_auto_parse_failure_is_authoritative() {
        let policy = AuthPolicy::with_secret(SECRET)
            .required(true)
            .auto_parse(true);
        let map = headers(&format!("Bearer {}", expired_token()));

        assert_eq!(
            authenticate(&policy, "/svc/Op", &map).unwrap_err(),
            AuthError::TokenExpired
        );
    }

    #[test]
    fn test_missing_key_source_rejects_required_calls() {
        let policy = AuthPolicy::default().required(true);
        let map = headers(&format!("Bearer {}", valid_token()));

        assert_eq!(
            authenticate(&policy, "/svc/Op", &map).unwrap_err(),
            AuthError::TokenInvalid
        );
    }

    #[tokio::test]
    async fn test_layer_requires_server_transport() {
        use tower::{service_fn, ServiceExt};

        let service = ServerAuthLayer::new(AuthPolicy::with_secret(SECRET)).layer(service_fn(
            |_: Call<()>| async { Ok::<_, AuthError>(()) },
        ));

        let result = service.oneshot(Call::new(Context::new(), ())).await;
        assert_eq!(result, Err(AuthError::WrongContext));
    }

    #[tokio::test]
    async fn test_layer_attaches_claims() {
        use tower::{service_fn, ServiceExt};

        let token = valid_token();
        let service = ServerAuthLayer::new(AuthPolicy::with_secret(SECRET).required(true)).layer(
            service_fn(|call: Call<()>| async move {
                Ok::<_, AuthError>((
                    call.ctx.subject().map(str::to_string),
                    call.ctx.raw_token().map(str::to_string),
                ))
            }),
        );

        let transport = Transport::new(Kind::Grpc, "/svc/Op")
            .with_headers(headers(&format!("Bearer {token}")));
        let (subject, raw) = service
            .oneshot(Call::new(Context::server(transport), ()))
            .await
            .unwrap();

        assert_eq!(subject.as_deref(), Some("u1"));
        assert_eq!(raw, Some(token));
    }

    #[test]
    fn test_interceptor_stores_claims_in_extensions() {
        let mut interceptor = JwtServerInterceptor::new(AuthPolicy::with_secret(SECRET).required(true));
        let token = valid_token();

        let mut request = Request::new(());
        request
            .metadata_mut()
            .insert("authorization", format!("Bearer {token}").parse().unwrap());

        let request = interceptor.call(request).unwrap();
        let claims = request.extensions().get::<Arc<Claims>>().unwrap();
        assert!(claims.is_subject("u1"));
        assert_eq!(request.extensions().get::<RawToken>().map(|t| t.0.as_str()), Some(token.as_str()));
    }

    #[test]
    fn test_interceptor_rejects_with_status() {
        let mut interceptor = JwtServerInterceptor::new(AuthPolicy::with_secret(SECRET).required(true));

        let status = interceptor.call(Request::new(())).unwrap_err();
        assert_eq!(status.code(), tonic::Code::Unauthenticated);
        assert_eq!(status.message(), "JWT token is missing");
    }

    #[test]
    fn test_interceptor_applies_exclusions() {
        let policy = AuthPolicy::with_secret(SECRET)
            .required(true)
            .excludes("/grpc.health.v1.Health/");
        let mut interceptor = JwtServerInterceptor::new(policy);

        let mut request = Request::new(());
        request
            .extensions_mut()
            .insert(Operation::new("/grpc.health.v1.Health/Check"));

        let request = interceptor.call(request).unwrap();
        assert!(request.extensions().get::<Arc<Claims>>().is_none());
    }
}
