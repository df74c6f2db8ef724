//! Authentication policy
//!
//! One [`AuthPolicy`] is built at server or client setup and shared by every
//! call afterwards. It is never mutated once built.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use config_core::AuthConfig;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header};
use secrecy::SecretString;

use crate::claims::Claims;
use crate::codec::TokenHeader;
use crate::error::AuthError;
use crate::key::{KeyResolver, KeySource, SecretKeyResolver};

/// Produces the claims minted for each outgoing call
pub type ClaimsFactory = Arc<dyn Fn() -> Claims + Send + Sync>;

/// Policy governing how an interceptor validates or issues tokens
///
/// | field            | default          |
/// |------------------|------------------|
/// | `required`       | `false`          |
/// | `excludes`       | empty            |
/// | `auto_parse`     | `false`          |
/// | `signing_method` | `HS256`          |
/// | `key`            | [`KeySource::None`] |
/// | `claims_factory` | empty [`Claims`] |
/// | `token_header`   | `typ: "JWT"`     |
#[derive(Clone)]
pub struct AuthPolicy {
    /// Fail calls that carry no valid token
    pub required: bool,

    /// Operation-name prefixes exempt from `required`
    pub excludes: Vec<String>,

    /// Parse the token before exclusion checks
    pub auto_parse: bool,

    /// Algorithm tokens must declare and are signed with
    pub signing_method: Algorithm,

    /// Key source for signing and verification
    pub key: KeySource,

    /// Claims minted for outgoing calls
    pub claims_factory: ClaimsFactory,

    /// Extra header fields for minted tokens
    pub token_header: TokenHeader,
}

impl Default for AuthPolicy {
    fn default() -> Self {
        Self {
            required: false,
            excludes: Vec::new(),
            auto_parse: false,
            signing_method: Algorithm::HS256,
            key: KeySource::None,
            claims_factory: Arc::new(Claims::default),
            token_header: TokenHeader::default(),
        }
    }
}

impl fmt::Debug for AuthPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthPolicy")
            .field("required", &self.required)
            .field("excludes", &self.excludes)
            .field("auto_parse", &self.auto_parse)
            .field("signing_method", &self.signing_method)
            .field("key", &self.key)
            .field("token_header", &self.token_header)
            .finish_non_exhaustive()
    }
}

impl AuthPolicy {
    /// Default policy with an HMAC secret
    pub fn with_secret(secret: impl Into<String>) -> Self {
        Self {
            key: KeySource::Secret(SecretString::from(secret.into())),
            ..Self::default()
        }
    }

    /// Build a policy from the service's `auth` configuration section
    ///
    /// ## Errors
    ///
    /// Returns an error if `signing_method` is not a known JWS algorithm.
    pub fn from_config(config: &AuthConfig) -> Result<Self, config_core::ConfigError> {
        let signing_method = Algorithm::from_str(&config.signing_method).map_err(|_| {
            config_core::ConfigError::Invalid(format!(
                "unknown signing method: {}",
                config.signing_method
            ))
        })?;

        Ok(Self {
            required: config.required,
            excludes: config.exclude_prefixes(),
            auto_parse: config.auto_parse,
            signing_method,
            key: KeySource::Secret(config.secret_key.clone()),
            ..Self::default()
        })
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    /// Set exclusions from a comma-separated prefix list
    pub fn excludes(mut self, excludes: &str) -> Self {
        self.excludes = excludes
            .split(',')
            .map(str::trim)
            .filter(|prefix| !prefix.is_empty())
            .map(str::to_string)
            .collect();
        self
    }

    pub fn auto_parse(mut self, auto_parse: bool) -> Self {
        self.auto_parse = auto_parse;
        self
    }

    pub fn signing_method(mut self, signing_method: Algorithm) -> Self {
        self.signing_method = signing_method;
        self
    }

    pub fn secret_key(mut self, secret: impl Into<String>) -> Self {
        self.key = KeySource::Secret(SecretString::from(secret.into()));
        self
    }

    pub fn key_resolver(mut self, resolver: impl KeyResolver + 'static) -> Self {
        self.key = KeySource::Resolver(Arc::new(resolver));
        self
    }

    pub fn claims_factory<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Claims + Send + Sync + 'static,
    {
        self.claims_factory = Arc::new(factory);
        self
    }

    pub fn token_header(mut self, token_header: TokenHeader) -> Self {
        self.token_header = token_header;
        self
    }

    /// Check whether an operation bypasses `required`
    pub fn is_excluded(&self, operation: &str) -> bool {
        self.excludes
            .iter()
            .any(|prefix| operation.starts_with(prefix.as_str()))
    }

    /// Fresh claims for an outgoing token
    pub fn new_claims(&self) -> Claims {
        (self.claims_factory)()
    }

    /// Resolve the verification key for an incoming token header
    pub fn decoding_key(&self, header: &Header) -> Result<DecodingKey, AuthError> {
        match &self.key {
            KeySource::None => Err(AuthError::MissingKeyFunc),
            KeySource::Secret(secret) => {
                SecretKeyResolver::new(self.signing_method, secret.clone()).decoding_key(header)
            }
            KeySource::Resolver(resolver) => resolver.decoding_key(header),
        }
    }

    /// Resolve the signing key for an outgoing token header
    pub fn encoding_key(&self, header: &Header) -> Result<EncodingKey, AuthError> {
        match &self.key {
            KeySource::None => Err(AuthError::NeedTokenProvider),
            KeySource::Secret(secret) => {
                SecretKeyResolver::new(self.signing_method, secret.clone()).encoding_key(header)
            }
            KeySource::Resolver(resolver) => resolver.encoding_key(header),
        }
    }
}
