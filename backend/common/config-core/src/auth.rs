//! Authentication configuration

use secrecy::SecretString;
use serde::Deserialize;
use validator::Validate;

/// JWT middleware configuration
///
/// Mirrors the `auth` section every server reads at startup. The secret is
/// supplied here (usually from a secrets backend through the environment),
/// never looked up by request-handling code.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AuthConfig {
    /// Fail calls that carry no valid token
    #[serde(default)]
    pub required: bool,

    /// Comma-separated operation-name prefixes exempt from `required`
    #[serde(default)]
    pub excludes: String,

    /// Parse the token before exclusion checks
    #[serde(default)]
    pub auto_parse: bool,

    /// JWS algorithm name, e.g. `HS256`
    #[validate(length(min = 1))]
    #[serde(default = "default_signing_method")]
    pub signing_method: String,

    /// HMAC secret
    #[serde(default = "empty_secret")]
    pub secret_key: SecretString,
}

fn default_signing_method() -> String {
    "HS256".to_string()
}

fn empty_secret() -> SecretString {
    SecretString::from(String::new())
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            required: false,
            excludes: String::new(),
            auto_parse: false,
            signing_method: default_signing_method(),
            secret_key: empty_secret(),
        }
    }
}

impl AuthConfig {
    /// Split `excludes` into trimmed, non-empty prefixes
    pub fn exclude_prefixes(&self) -> Vec<String> {
        self.excludes
            .split(',')
            .map(str::trim)
            .filter(|prefix| !prefix.is_empty())
            .map(str::to_string)
            .collect()
    }
}
