//! Token codec
//!
//! Signs claims into compact JWS strings and verifies them back.
//!
//! ## Security Design
//!
//! - The token's declared `alg` must equal the policy's signing method;
//!   the key resolver refuses anything else before a signature is checked
//! - `exp` is enforced with zero leeway and must lie strictly after now;
//!   `iat` may not lie in the future
//! - `nbf` is not enforced
//! - Every decode deserializes into a brand-new [`Claims`] value

use std::collections::HashSet;

use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, Header, Validation};
use secrecy::SecretString;
use tracing::{debug, warn};

use crate::claims::Claims;
use crate::error::AuthError;
use crate::policy::AuthPolicy;

/// Lifetime of tokens minted by [`generate_access_token`]
pub const ACCESS_TOKEN_EXPIRY_HOURS: i64 = 24;

/// Header fields added to minted tokens
///
/// `alg` is never configurable here; it always follows the policy's
/// signing method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenHeader {
    /// Media type of the token
    pub typ: Option<String>,

    /// Key identifier
    pub kid: Option<String>,

    /// Content type
    pub cty: Option<String>,
}

impl Default for TokenHeader {
    fn default() -> Self {
        Self {
            typ: Some("JWT".to_string()),
            kid: None,
            cty: None,
        }
    }
}

impl TokenHeader {
    /// Build the JOSE header for a signing method
    pub fn to_header(&self, algorithm: Algorithm) -> Header {
        let mut header = Header::new(algorithm);
        header.typ = self.typ.clone();
        header.kid = self.kid.clone();
        header.cty = self.cty.clone();
        header
    }
}

/// Sign claims under a policy
///
/// ## Errors
///
/// - [`AuthError::NeedTokenProvider`] if the policy has no key source
/// - [`AuthError::GetKey`] if the key resolver fails
/// - [`AuthError::SignToken`] if the signature cannot be computed
pub fn encode(claims: &Claims, policy: &AuthPolicy) -> Result<String, AuthError> {
    let header = policy.token_header.to_header(policy.signing_method);

    let key = policy.encoding_key(&header).map_err(|e| match e {
        AuthError::NeedTokenProvider => e,
        other => {
            warn!(error = %other, "Failed to resolve signing key");
            AuthError::GetKey
        }
    })?;

    jsonwebtoken::encode(&header, claims, &key).map_err(|e| {
        warn!(error = %e, "Failed to sign token");
        AuthError::SignToken
    })
}

/// Verify a compact token under a policy and return its claims
///
/// ## Errors
///
/// - [`AuthError::TokenInvalid`]: malformed token, key refused, bad signature
/// - [`AuthError::UnsupportedSigningMethod`]: a resolver accepted a header
///   whose algorithm is not the policy's
/// - [`AuthError::TokenExpired`]: valid signature, `exp` in the past
/// - [`AuthError::TokenParseFail`]: signed payload is not a claims object
pub fn decode(token: &str, policy: &AuthPolicy) -> Result<Claims, AuthError> {
    let header = jsonwebtoken::decode_header(token).map_err(|e| {
        debug!(error = %e, "Malformed token header");
        AuthError::TokenInvalid
    })?;

    let key = policy.decoding_key(&header).map_err(|e| {
        debug!(error = %e, alg = ?header.alg, "Verification key refused");
        AuthError::TokenInvalid
    })?;

    let mut validation = Validation::new(policy.signing_method);
    validation.leeway = 0;
    validation.validate_exp = true;
    validation.validate_nbf = false;
    validation.validate_aud = false;
    validation.required_spec_claims = HashSet::new();

    let token_data =
        jsonwebtoken::decode::<Claims>(token, &key, &validation).map_err(|e| classify(e.kind()))?;

    let claims = token_data.claims;
    let now = Utc::now();

    // jsonwebtoken skips `exp` values it cannot read as unsigned
    if claims.is_expired_at(now) {
        debug!(exp = ?claims.expires_at, "Token expired");
        return Err(AuthError::TokenExpired);
    }

    if claims.is_issued_in_future(now) {
        debug!("Token issued in the future");
        return Err(AuthError::TokenInvalid);
    }

    Ok(claims)
}

fn classify(kind: &ErrorKind) -> AuthError {
    match kind {
        ErrorKind::ExpiredSignature => AuthError::TokenExpired,
        ErrorKind::InvalidAlgorithm => AuthError::UnsupportedSigningMethod,
        ErrorKind::Json(_) | ErrorKind::Utf8(_) => AuthError::TokenParseFail,
        other => {
            debug!(error = ?other, "Token verification failed");
            AuthError::TokenInvalid
        }
    }
}

/// Mint a 24-hour HS256 access token for a user
///
/// The header is fixed to `{"typ": "JWT", "alg": "HS256"}`.
pub fn generate_access_token(user_id: &str, secret: &SecretString) -> Result<String, AuthError> {
    let claims = Claims::new(user_id).expires(Utc::now() + Duration::hours(ACCESS_TOKEN_EXPIRY_HOURS));

    let policy = AuthPolicy {
        key: crate::key::KeySource::Secret(secret.clone()),
        ..AuthPolicy::default()
    };

    encode(&claims, &policy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::tests::{TEST_PRIVATE_KEY, TEST_PUBLIC_KEY};
    use crate::key::RsaKeyResolver;
    use jsonwebtoken::EncodingKey;

    const SECRET: &str = "YOURSECRETKEYGOESHERE";

    fn policy() -> AuthPolicy {
        AuthPolicy::with_secret(SECRET)
    }

    fn sign_raw(alg: Algorithm, secret: &str, claims: &Claims) -> String {
        jsonwebtoken::encode(
            &Header::new(alg),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn test_round_trip() {
        let claims = Claims::new("123456789")
            .valid_for(Duration::hours(1))
            .with_claim("email", "test@example.com");

        let token = encode(&claims, &policy()).unwrap();
        assert_eq!(token.split('.').count(), 3);

        let decoded = decode(&token, &policy()).unwrap();
        assert_eq!(decoded, claims);
    }

    #[test]
    fn test_header_fields() {
        let policy = policy().token_header(TokenHeader {
            typ: Some("JWT".to_string()),
            kid: Some("key-1".to_string()),
            cty: None,
        });

        let token = encode(&Claims::new("u1"), &policy).unwrap();
        let header = jsonwebtoken::decode_header(&token).unwrap();
        assert_eq!(header.alg, Algorithm::HS256);
        assert_eq!(header.typ.as_deref(), Some("JWT"));
        assert_eq!(header.kid.as_deref(), Some("key-1"));
    }

    #[test]
    fn test_claims_without_expiry_are_accepted() {
        let token = encode(&Claims::new("u1"), &policy()).unwrap();
        let claims = decode(&token, &policy()).unwrap();
        assert_eq!(claims.expires_at, None);
    }

    #[test]
    fn test_expired_token() {
        let claims = Claims::new("u1")
            .issued(Utc::now() - Duration::days(2))
            .expires(Utc::now() - Duration::days(1));
        let token = sign_raw(Algorithm::HS256, SECRET, &claims);

        assert_eq!(decode(&token, &policy()), Err(AuthError::TokenExpired));
    }

    #[test]
    fn test_negative_expiry_is_expired() {
        let claims = Claims {
            subject: Some("u1".to_string()),
            expires_at: Some(-100),
            ..Claims::default()
        };
        let token = sign_raw(Algorithm::HS256, SECRET, &claims);

        assert_eq!(decode(&token, &policy()), Err(AuthError::TokenExpired));
    }

    #[test]
    fn test_expiry_at_current_second_is_expired() {
        let claims = Claims::new("u1").expires(Utc::now());
        let token = sign_raw(Algorithm::HS256, SECRET, &claims);

        assert_eq!(decode(&token, &policy()), Err(AuthError::TokenExpired));
    }

    #[test]
    fn test_registered_names_in_extra_round_trip() {
        let claims = Claims::default().with_claim("sub", "admin");
        let token = encode(&claims, &policy()).unwrap();
        assert_eq!(decode(&token, &policy()), Ok(claims));

        let claims = Claims::new("u")
            .valid_for(Duration::hours(1))
            .with_claim("exp", 1)
            .with_claim("role", "reader");
        let token = encode(&claims, &policy()).unwrap();
        assert_eq!(decode(&token, &policy()), Ok(claims));
    }

    #[test]
    fn test_expired_token_with_wrong_signature_is_invalid() {
        let claims = Claims::new("u1").expires(Utc::now() - Duration::days(1));
        let token = sign_raw(Algorithm::HS256, "other-secret", &claims);

        assert_eq!(decode(&token, &policy()), Err(AuthError::TokenInvalid));
    }

    #[test]
    fn test_future_issued_at_is_invalid() {
        let claims = Claims::new("u1").issued(Utc::now() + Duration::hours(1));
        let token = sign_raw(Algorithm::HS256, SECRET, &claims);

        assert_eq!(decode(&token, &policy()), Err(AuthError::TokenInvalid));
    }

    #[test]
    fn test_garbage_tokens_are_invalid() {
        for token in ["123", "a.b.c", "", "...", "eyJhbGciOiJIUzI1NiJ9.e30"] {
            assert_eq!(decode(token, &policy()), Err(AuthError::TokenInvalid), "{token}");
        }
    }

    #[test]
    fn test_tampered_token_is_invalid() {
        let token = encode(&Claims::new("u1").valid_for(Duration::hours(1)), &policy()).unwrap();
        let forged = encode(&Claims::new("admin").valid_for(Duration::hours(1)), &policy()).unwrap();

        // admin payload under the u1 signature
        let mut parts: Vec<&str> = token.split('.').collect();
        parts[1] = forged.split('.').nth(1).unwrap();

        assert_eq!(decode(&parts.join("."), &policy()), Err(AuthError::TokenInvalid));
    }

    #[test]
    fn test_algorithm_mismatch_is_rejected() {
        // Same secret, different HMAC algorithm
        let token = sign_raw(Algorithm::HS512, SECRET, &Claims::new("u1"));
        assert_eq!(decode(&token, &policy()), Err(AuthError::TokenInvalid));
    }

    #[test]
    fn test_none_algorithm_is_rejected() {
        // {"alg":"none","typ":"JWT"}.{"sub":"admin"}.
        let token = "eyJhbGciOiJub25lIiwidHlwIjoiSldUIn0.eyJzdWIiOiJhZG1pbiJ9.";
        assert_eq!(decode(token, &policy()), Err(AuthError::TokenInvalid));
    }

    #[test]
    fn test_permissive_resolver_still_enforces_signing_method() {
        struct AnyHmac;

        impl crate::key::KeyResolver for AnyHmac {
            fn decoding_key(&self, _: &Header) -> Result<jsonwebtoken::DecodingKey, AuthError> {
                Ok(jsonwebtoken::DecodingKey::from_secret(SECRET.as_bytes()))
            }

            fn encoding_key(&self, _: &Header) -> Result<EncodingKey, AuthError> {
                Ok(EncodingKey::from_secret(SECRET.as_bytes()))
            }
        }

        let policy = AuthPolicy::default().key_resolver(AnyHmac);
        let token = sign_raw(Algorithm::HS512, SECRET, &Claims::new("u1"));

        assert_eq!(decode(&token, &policy), Err(AuthError::UnsupportedSigningMethod));
    }

    #[test]
    fn test_non_object_payload_fails_to_parse() {
        let token = jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &vec![1, 2, 3],
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();

        assert_eq!(decode(&token, &policy()), Err(AuthError::TokenParseFail));
    }

    #[test]
    fn test_encode_without_key_source() {
        let result = encode(&Claims::new("u1"), &AuthPolicy::default());
        assert_eq!(result, Err(AuthError::NeedTokenProvider));
    }

    #[test]
    fn test_encode_with_refusing_resolver() {
        let resolver = RsaKeyResolver::validation_only(Algorithm::RS256, TEST_PUBLIC_KEY).unwrap();
        let policy = AuthPolicy::default()
            .signing_method(Algorithm::RS256)
            .key_resolver(resolver);

        assert_eq!(encode(&Claims::new("u1"), &policy), Err(AuthError::GetKey));
    }

    #[test]
    fn test_rsa_round_trip() {
        let signer = RsaKeyResolver::new(Algorithm::RS256, TEST_PRIVATE_KEY, TEST_PUBLIC_KEY).unwrap();
        let signing_policy = AuthPolicy::default()
            .signing_method(Algorithm::RS256)
            .key_resolver(signer);

        let verifier = RsaKeyResolver::validation_only(Algorithm::RS256, TEST_PUBLIC_KEY).unwrap();
        let verifying_policy = AuthPolicy::default()
            .signing_method(Algorithm::RS256)
            .key_resolver(verifier);

        let claims = Claims::new("u1").valid_for(Duration::hours(1));
        let token = encode(&claims, &signing_policy).unwrap();
        assert_eq!(decode(&token, &verifying_policy), Ok(claims));

        // An HMAC token never verifies against an RSA-only policy
        let hmac = sign_raw(Algorithm::HS256, TEST_PUBLIC_KEY, &Claims::new("u1"));
        assert_eq!(decode(&hmac, &verifying_policy), Err(AuthError::TokenInvalid));
    }

    #[test]
    fn test_generate_access_token() {
        let secret = SecretString::from(SECRET.to_string());
        let token = generate_access_token("123456789", &secret).unwrap();

        let header = jsonwebtoken::decode_header(&token).unwrap();
        assert_eq!(header.alg, Algorithm::HS256);
        assert_eq!(header.typ.as_deref(), Some("JWT"));

        let claims = decode(&token, &policy()).unwrap();
        assert_eq!(claims.subject.as_deref(), Some("123456789"));

        let remaining = claims.expires_at_utc().unwrap() - Utc::now();
        assert!(remaining > Duration::hours(23));
        assert!(remaining <= Duration::hours(24));
    }
}
