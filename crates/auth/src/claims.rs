use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Claims carried in the payload segment of a session token.
///
/// The console never verifies signatures; the backend is the only authority on
/// whether a token is genuine. These claims exist so the client can notice an
/// expired token without a round trip.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Backend user id, when the issuer includes it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// Issued-at, unix seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,

    /// Expiry, unix seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
}

impl TokenClaims {
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.exp.and_then(|exp| DateTime::from_timestamp(exp, 0))
    }

    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        self.iat.and_then(|iat| DateTime::from_timestamp(iat, 0))
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenValidationError {
    #[error("token has expired")]
    Expired,

    #[error("malformed token: {0}")]
    Malformed(String),
}

/// Decode the payload segment of a `header.payload.signature` token.
///
/// Signature verification is intentionally outside this crate.
pub fn decode_unverified(token: &str) -> Result<TokenClaims, TokenValidationError> {
    let mut segments = token.trim().split('.');
    let (Some(_header), Some(payload), Some(_signature), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return Err(TokenValidationError::Malformed(
            "expected three dot-separated segments".to_string(),
        ));
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| TokenValidationError::Malformed(format!("payload is not base64url: {e}")))?;

    serde_json::from_slice(&bytes)
        .map_err(|e| TokenValidationError::Malformed(format!("payload is not a claims object: {e}")))
}

/// Deterministically validate token claims against `now`.
///
/// A token without an `exp` claim has no local expiry; only the backend can
/// reject it.
pub fn validate_claims(claims: &TokenClaims, now: DateTime<Utc>) -> Result<(), TokenValidationError> {
    if let Some(exp) = claims.exp {
        if now.timestamp() >= exp {
            return Err(TokenValidationError::Expired);
        }
    }
    Ok(())
}

#[cfg(test)]
pub(crate) fn encode_unsigned(claims: &TokenClaims) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(claims).unwrap());
    format!("{header}.{payload}.signature")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn decodes_payload_claims() {
        let claims = TokenClaims {
            user_id: Some(7),
            username: Some("alice".to_string()),
            iat: Some(1_700_000_000),
            exp: Some(1_700_003_600),
        };

        let token = encode_unsigned(&claims);
        assert_eq!(decode_unverified(&token).unwrap(), claims);
    }

    #[test]
    fn ignores_unknown_claims() {
        let payload = URL_SAFE_NO_PAD.encode(br#"{"exp":10,"role":"admin","sub":"7"}"#);
        let claims = decode_unverified(&format!("h.{payload}.s")).unwrap();
        assert_eq!(claims.exp, Some(10));
        assert_eq!(claims.user_id, None);
    }

    #[test]
    fn rejects_malformed_tokens() {
        assert!(matches!(
            decode_unverified("opaque-token"),
            Err(TokenValidationError::Malformed(_))
        ));
        assert!(matches!(
            decode_unverified("a.!!!.c"),
            Err(TokenValidationError::Malformed(_))
        ));
        assert!(matches!(
            decode_unverified("a.b.c.d"),
            Err(TokenValidationError::Malformed(_))
        ));
    }

    #[test]
    fn expiry_is_inclusive() {
        let now = Utc::now();
        let claims = TokenClaims {
            exp: Some(now.timestamp()),
            ..Default::default()
        };
        assert_eq!(validate_claims(&claims, now), Err(TokenValidationError::Expired));
        assert_eq!(
            validate_claims(&claims, now - Duration::seconds(1)),
            Ok(())
        );
    }

    #[test]
    fn missing_expiry_never_expires_locally() {
        let claims = TokenClaims::default();
        assert_eq!(validate_claims(&claims, Utc::now() + Duration::days(3650)), Ok(()));
    }

    #[test]
    fn only_expiry_decides() {
        let claims = TokenClaims {
            iat: Some(100),
            exp: Some(100),
            ..Default::default()
        };
        assert_eq!(
            validate_claims(&claims, DateTime::from_timestamp(99, 0).unwrap()),
            Ok(())
        );
        assert_eq!(
            validate_claims(&claims, DateTime::from_timestamp(100, 0).unwrap()),
            Err(TokenValidationError::Expired)
        );
    }
}
