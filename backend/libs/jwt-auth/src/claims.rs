//! JWT Claims Structure
//!
//! Registered claims the middleware checks (`sub`, `exp`, `iat`) plus an
//! open map for domain fields such as `email`.

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

/// Claim name holding the caller's email address
pub const EMAIL_CLAIM: &str = "email";

/// Claim names backed by typed fields; never carried in `extra`
pub const REGISTERED_CLAIMS: [&str; 3] = ["sub", "exp", "iat"];

fn is_registered(name: &str) -> bool {
    REGISTERED_CLAIMS.contains(&name)
}

/// Identity assertion carried by a signed token
///
/// ## Design Notes
///
/// - Fields are public for direct construction before signing
/// - Once verified, claims are only handed out as shared references
/// - Timestamps are Unix seconds, matching the wire format
/// - `extra` entries named `sub`, `exp` or `iat` are never serialized;
///   the typed fields own those names
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Claims {
    /// Principal identifier
    #[serde(rename = "sub", default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,

    /// Expiration timestamp
    #[serde(rename = "exp", default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,

    /// Issued at timestamp
    #[serde(rename = "iat", default, skip_serializing_if = "Option::is_none")]
    pub issued_at: Option<i64>,

    /// Domain-specific claims
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Claims {
    /// Claims for a subject, without expiry
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: Some(subject.into()),
            ..Self::default()
        }
    }

    /// Set `iat` to now and `exp` to now + `ttl`
    pub fn valid_for(mut self, ttl: Duration) -> Self {
        let now = Utc::now();
        self.issued_at = Some(now.timestamp());
        self.expires_at = Some((now + ttl).timestamp());
        self
    }

    /// Set an absolute expiry
    pub fn expires(mut self, at: DateTime<Utc>) -> Self {
        self.expires_at = Some(at.timestamp());
        self
    }

    /// Set an absolute issue time
    pub fn issued(mut self, at: DateTime<Utc>) -> Self {
        self.issued_at = Some(at.timestamp());
        self
    }

    /// Add a domain-specific claim
    ///
    /// Registered names (`sub`, `exp`, `iat`) are ignored; set them through
    /// [`Claims::new`], [`Claims::expires`] or [`Claims::issued`].
    pub fn with_claim(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        let name = name.into();
        if is_registered(&name) {
            tracing::debug!(claim = %name, "Ignoring registered claim name in extra claims");
            return self;
        }
        self.extra.insert(name, value.into());
        self
    }

    /// Look up a domain-specific claim
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.extra.get(name)
    }

    /// Look up a string claim; absent or non-string values yield `None`
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.extra.get(name).and_then(Value::as_str)
    }

    /// Email address, if the token carries one
    pub fn email(&self) -> Option<&str> {
        self.get_str(EMAIL_CLAIM)
    }

    /// Expiry as a timestamp
    pub fn expires_at_utc(&self) -> Option<DateTime<Utc>> {
        self.expires_at
            .and_then(|exp| Utc.timestamp_opt(exp, 0).single())
    }

    /// Check whether the token had expired at `now`
    ///
    /// `exp` must lie strictly after `now`, so a token expiring in the
    /// current second is already expired. Claims without `exp` never expire.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at
            .map(|exp| exp <= now.timestamp())
            .unwrap_or(false)
    }

    /// Check whether `iat` lies after `now`
    pub fn is_issued_in_future(&self, now: DateTime<Utc>) -> bool {
        self.issued_at
            .map(|iat| iat > now.timestamp())
            .unwrap_or(false)
    }

    /// Check if the subject matches a given identifier
    ///
    /// Useful for resource ownership checks.
    pub fn is_subject(&self, id: &str) -> bool {
        self.subject.as_deref() == Some(id)
    }
}

impl Serialize for Claims {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        if let Some(subject) = &self.subject {
            map.serialize_entry("sub", subject)?;
        }
        if let Some(exp) = &self.expires_at {
            map.serialize_entry("exp", exp)?;
        }
        if let Some(iat) = &self.issued_at {
            map.serialize_entry("iat", iat)?;
        }
        for (name, value) in self.extra.iter().filter(|(name, _)| !is_registered(name)) {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}
