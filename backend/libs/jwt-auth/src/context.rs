//! Call execution context
//!
//! A [`Context`] travels with one call through the middleware chain. It has
//! two typed authentication channels:
//!
//! - **claims**: the verified identity, set by the server middleware
//! - **raw token**: the exact token string, reused verbatim by the client
//!   middleware when the call fans out to another service
//!
//! Both are `Option`s: an anonymous call is `None`, which is distinct from a
//! call authenticated with empty claims.

use std::sync::Arc;

use http::Extensions;

use crate::claims::Claims;
use crate::transport::Transport;

/// Execution context of one call
#[derive(Debug, Clone, Default)]
pub struct Context {
    pub(crate) claims: Option<Arc<Claims>>,
    pub(crate) raw_token: Option<String>,
    pub(crate) server: Option<Transport>,
    pub(crate) client: Option<Transport>,
    extensions: Extensions,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Context of an incoming call
    pub fn server(transport: Transport) -> Self {
        Self::default().with_server_transport(transport)
    }

    /// Context of an outgoing call
    pub fn client(transport: Transport) -> Self {
        Self::default().with_client_transport(transport)
    }

    pub fn with_server_transport(mut self, transport: Transport) -> Self {
        self.server = Some(transport);
        self
    }

    pub fn with_client_transport(mut self, transport: Transport) -> Self {
        self.client = Some(transport);
        self
    }

    /// Attach verified claims
    pub fn with_claims(mut self, claims: impl Into<Arc<Claims>>) -> Self {
        self.claims = Some(claims.into());
        self
    }

    /// Attach the token string to forward on outgoing calls
    pub fn with_raw_token(mut self, token: impl Into<String>) -> Self {
        self.raw_token = Some(token.into());
        self
    }

    pub fn claims(&self) -> Option<&Claims> {
        self.claims.as_deref()
    }

    /// Shared handle to the claims, for storing beyond this call
    pub fn shared_claims(&self) -> Option<Arc<Claims>> {
        self.claims.clone()
    }

    pub fn raw_token(&self) -> Option<&str> {
        self.raw_token.as_deref()
    }

    /// Subject of the verified claims
    pub fn subject(&self) -> Option<&str> {
        self.claims().and_then(|claims| claims.subject.as_deref())
    }

    /// Email of the verified claims
    pub fn email(&self) -> Option<&str> {
        self.claims().and_then(Claims::email)
    }

    pub fn server_transport(&self) -> Option<&Transport> {
        self.server.as_ref()
    }

    pub fn client_transport(&self) -> Option<&Transport> {
        self.client.as_ref()
    }

    pub fn client_transport_mut(&mut self) -> Option<&mut Transport> {
        self.client.as_mut()
    }

    /// Values unrelated to authentication, keyed by type
    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.extensions
    }

    pub(crate) fn authenticate(&mut self, claims: Arc<Claims>, token: String) {
        self.claims = Some(claims);
        self.raw_token = Some(token);
    }
}

/// A request paired with its execution context
///
/// This is the request type the tower middleware in this crate operates on.
#[derive(Debug, Clone)]
pub struct Call<Req> {
    pub ctx: Context,
    pub request: Req,
}

impl<Req> Call<Req> {
    pub fn new(ctx: Context, request: Req) -> Self {
        Self { ctx, request }
    }

    pub fn into_parts(self) -> (Context, Req) {
        (self.ctx, self.request)
    }
}
