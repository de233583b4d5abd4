//! Error taxonomy for the console client.

use thiserror::Error;

use tounet_auth::{AuthzError, TokenValidationError};

/// Failure of a single backend request.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Credentials rejected or token invalid/expired/revoked (HTTP 401).
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Input rejected by the backend (HTTP 400/422).
    #[error("validation error: {0}")]
    Validation(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("API error ({0}): {1}")]
    Api(u16, String),

    #[error("parse error: {0}")]
    Parse(String),
}

impl ApiError {
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, ApiError::Unauthorized(_))
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::Parse(err.to_string())
        } else {
            ApiError::Network(err.to_string())
        }
    }
}

/// Failure of the durable token store.
#[derive(Debug, Error)]
pub enum TokenStoreError {
    #[error("token store I/O error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("token store is corrupt: {0}")]
    Corrupt(String),
}

/// Session lifecycle failures surfaced to callers.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("token rejected before use: {0}")]
    InvalidToken(#[from] TokenValidationError),

    #[error(transparent)]
    Store(#[from] TokenStoreError),

    /// The identity fetch failed; the session was logged out.
    #[error("session rejected: {0}")]
    Rejected(#[source] ApiError),

    /// A newer login superseded this fetch; its result was discarded.
    #[error("identity fetch superseded by a newer login")]
    Superseded,
}

/// Errors returned by the [`crate::Console`] façade.
#[derive(Debug, Error)]
pub enum ConsoleError {
    #[error("not authenticated")]
    NotAuthenticated,

    #[error(transparent)]
    Forbidden(#[from] AuthzError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Session(#[from] SessionError),
}
