//! Session token errors.

use thiserror::Error;

/// Failures while issuing a token.
///
/// Verification never reports these; it collapses every failure to `None`.
/// A missing or weak secret is reported by
/// [`SessionTokenService::try_from_config`](crate::auth::SessionTokenService::try_from_config)
/// before any token can be issued.
#[derive(Debug, Error)]
pub enum SessionTokenError {
    #[error("session lifetime must be positive and representable")]
    InvalidTtl,

    #[error("failed to encode session payload")]
    Encoding(#[source] serde_json::Error),
}

impl From<serde_json::Error> for SessionTokenError {
    fn from(error: serde_json::Error) -> Self {
        Self::Encoding(error)
    }
}
