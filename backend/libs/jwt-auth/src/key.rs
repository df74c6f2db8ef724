//! Signing and verification key resolution
//!
//! A [`KeyResolver`] maps a token header to the key that signs or verifies
//! it. Resolvers MUST refuse headers whose `alg` differs from the algorithm
//! they were built for; that check is what keeps an attacker from choosing
//! the verification algorithm.

use std::fmt;
use std::sync::Arc;

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header};
use secrecy::{ExposeSecret, SecretString};

use crate::error::AuthError;

/// Resolves keys from token headers
pub trait KeyResolver: Send + Sync {
    /// Key used to verify an incoming token
    fn decoding_key(&self, header: &Header) -> Result<DecodingKey, AuthError>;

    /// Key used to sign an outgoing token
    fn encoding_key(&self, header: &Header) -> Result<EncodingKey, AuthError>;
}

/// Where a policy obtains its keys
#[derive(Clone, Default)]
pub enum KeySource {
    /// Nothing configured; every resolution fails
    #[default]
    None,

    /// Shared HMAC secret, accepted only for the policy's signing method
    Secret(SecretString),

    /// Caller-supplied resolver
    Resolver(Arc<dyn KeyResolver>),
}

impl fmt::Debug for KeySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("KeySource::None"),
            Self::Secret(_) => f.write_str("KeySource::Secret([REDACTED])"),
            Self::Resolver(_) => f.write_str("KeySource::Resolver(..)"),
        }
    }
}

/// HMAC resolver bound to one algorithm
pub struct SecretKeyResolver {
    algorithm: Algorithm,
    secret: SecretString,
}

impl SecretKeyResolver {
    pub fn new(algorithm: Algorithm, secret: SecretString) -> Self {
        Self { algorithm, secret }
    }

    fn check(&self, header: &Header) -> Result<(), AuthError> {
        if header.alg == self.algorithm {
            Ok(())
        } else {
            tracing::debug!(
                expected = ?self.algorithm,
                actual = ?header.alg,
                "Refusing key for mismatched algorithm"
            );
            Err(AuthError::MissingKeyFunc)
        }
    }
}

impl KeyResolver for SecretKeyResolver {
    fn decoding_key(&self, header: &Header) -> Result<DecodingKey, AuthError> {
        self.check(header)?;
        Ok(DecodingKey::from_secret(self.secret.expose_secret().as_bytes()))
    }

    fn encoding_key(&self, header: &Header) -> Result<EncodingKey, AuthError> {
        self.check(header)?;
        Ok(EncodingKey::from_secret(self.secret.expose_secret().as_bytes()))
    }
}

fn is_rsa(algorithm: Algorithm) -> bool {
    matches!(
        algorithm,
        Algorithm::RS256
            | Algorithm::RS384
            | Algorithm::RS512
            | Algorithm::PS256
            | Algorithm::PS384
            | Algorithm::PS512
    )
}

/// RSA resolver for RS/PS algorithms
///
/// Services that only validate tokens can be built with the public key
/// alone; asking them to sign fails with [`AuthError::GetKey`].
pub struct RsaKeyResolver {
    algorithm: Algorithm,
    decoding_key: DecodingKey,
    encoding_key: Option<EncodingKey>,
}

impl RsaKeyResolver {
    /// Resolver able to sign and verify
    ///
    /// ## Errors
    ///
    /// Returns [`AuthError::GetKey`] if the algorithm is not an RSA one or
    /// either PEM fails to parse.
    pub fn new(
        algorithm: Algorithm,
        private_key_pem: &str,
        public_key_pem: &str,
    ) -> Result<Self, AuthError> {
        let mut resolver = Self::validation_only(algorithm, public_key_pem)?;
        let encoding_key = EncodingKey::from_rsa_pem(private_key_pem.as_bytes()).map_err(|e| {
            tracing::error!(error = %e, "Failed to parse RSA private key");
            AuthError::GetKey
        })?;
        resolver.encoding_key = Some(encoding_key);
        Ok(resolver)
    }

    /// Resolver able to verify only
    pub fn validation_only(algorithm: Algorithm, public_key_pem: &str) -> Result<Self, AuthError> {
        if !is_rsa(algorithm) {
            tracing::error!(?algorithm, "RSA resolver requires an RSA algorithm");
            return Err(AuthError::GetKey);
        }

        let decoding_key = DecodingKey::from_rsa_pem(public_key_pem.as_bytes()).map_err(|e| {
            tracing::error!(error = %e, "Failed to parse RSA public key");
            AuthError::GetKey
        })?;

        Ok(Self {
            algorithm,
            decoding_key,
            encoding_key: None,
        })
    }
}

impl KeyResolver for RsaKeyResolver {
    fn decoding_key(&self, header: &Header) -> Result<DecodingKey, AuthError> {
        if header.alg != self.algorithm {
            return Err(AuthError::MissingKeyFunc);
        }
        Ok(self.decoding_key.clone())
    }

    fn encoding_key(&self, header: &Header) -> Result<EncodingKey, AuthError> {
        if header.alg != self.algorithm {
            return Err(AuthError::MissingKeyFunc);
        }
        self.encoding_key.clone().ok_or(AuthError::GetKey)
    }
}
