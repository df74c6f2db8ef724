//! Transport descriptions
//!
//! A [`Transport`] is what the middleware sees of the wire: which protocol
//! carries the call, the operation being invoked, and the request headers.
//! Servers read incoming headers from it, clients write outgoing ones.

use std::task::{Context as TaskContext, Poll};

use http::header::HOST;
use http::HeaderMap;
use tonic::Request;
use tower::{Layer, Service};

/// Wire protocol of a call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Grpc,
    Http,
}

/// Headers and routing information of one call
#[derive(Debug, Clone)]
pub struct Transport {
    kind: Kind,
    endpoint: String,
    operation: String,
    request_header: HeaderMap,
}

impl Transport {
    pub fn new(kind: Kind, operation: impl Into<String>) -> Self {
        Self {
            kind,
            endpoint: String::new(),
            operation: operation.into(),
            request_header: HeaderMap::new(),
        }
    }

    /// Describe an incoming HTTP request
    ///
    /// The operation is the URI path; the endpoint is the URI authority,
    /// falling back to the `Host` header.
    pub fn from_http_parts(parts: &http::request::Parts) -> Self {
        let endpoint = parts
            .uri
            .authority()
            .map(|authority| authority.to_string())
            .or_else(|| {
                parts
                    .headers
                    .get(HOST)
                    .and_then(|host| host.to_str().ok())
                    .map(str::to_string)
            })
            .unwrap_or_default();

        Self {
            kind: Kind::Http,
            endpoint,
            operation: parts.uri.path().to_string(),
            request_header: parts.headers.clone(),
        }
    }

    /// Describe an incoming gRPC request
    ///
    /// The operation comes from the [`Operation`] extension recorded by
    /// [`OperationLayer`]; without that layer it is empty and no exclusion
    /// prefix can match.
    pub fn from_grpc_request<T>(request: &Request<T>) -> Self {
        let operation = request
            .extensions()
            .get::<Operation>()
            .map(|op| op.as_str().to_string())
            .unwrap_or_default();

        Self {
            kind: Kind::Grpc,
            endpoint: String::new(),
            operation,
            request_header: request.metadata().clone().into_headers(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.request_header = headers;
        self
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Full operation name, e.g. `/helloworld.Greeter/SayHello`
    pub fn operation(&self) -> &str {
        &self.operation
    }

    pub fn request_header(&self) -> &HeaderMap {
        &self.request_header
    }

    pub fn request_header_mut(&mut self) -> &mut HeaderMap {
        &mut self.request_header
    }
}

/// Operation name of an incoming request, stored in request extensions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation(String);

impl Operation {
    pub fn new(operation: impl Into<String>) -> Self {
        Self(operation.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Records the URI path of each request as its [`Operation`]
///
/// tonic interceptors only see metadata and extensions, not the path, so
/// this layer has to wrap the service for exclusion rules to apply:
///
/// ```rust,ignore
/// Server::builder()
///     .layer(OperationLayer)
///     .add_service(GreeterServer::with_interceptor(greeter, interceptor))
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct OperationLayer;

impl<S> Layer<S> for OperationLayer {
    type Service = OperationService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        OperationService { inner }
    }
}

/// Service produced by [`OperationLayer`]
#[derive(Debug, Clone)]
pub struct OperationService<S> {
    inner: S,
}

impl<S, B> Service<http::Request<B>> for OperationService<S>
where
    S: Service<http::Request<B>>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(&mut self, cx: &mut TaskContext<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: http::Request<B>) -> Self::Future {
        let operation = Operation::new(request.uri().path());
        request.extensions_mut().insert(operation);
        self.inner.call(request)
    }
}
