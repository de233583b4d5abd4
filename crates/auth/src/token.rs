use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::claims::{TokenClaims, TokenValidationError, decode_unverified, validate_claims};

/// Opaque bearer credential issued by the backend at login.
///
/// `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuthToken(String);

impl AuthToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn claims(&self) -> Result<TokenClaims, TokenValidationError> {
        decode_unverified(&self.0)
    }

    /// Check the embedded expiry claim.
    ///
    /// A token whose claims cannot be read is reported as unusable.
    pub fn validate(&self, now: DateTime<Utc>) -> Result<(), TokenValidationError> {
        validate_claims(&self.claims()?, now)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.validate(now).is_err()
    }
}

impl core::fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("AuthToken(<redacted>)")
    }
}

impl From<String> for AuthToken {
    fn from(value: String) -> Self {
        Self(value)
    }
}
