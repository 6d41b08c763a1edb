//! Session token service.

use std::time::Duration;

use jiff::Timestamp;
use tracing::debug;

use crate::auth::{
    ConfigurationError, SessionSecretConfig, SessionToken, SessionTokenError,
    SessionTokenPayload, SessionUser, UnverifiedDisplayHint, VerifiedIdentity,
    signature::{SignatureEngine, SigningKey},
    token::{decode_payload, encode_token, signature_matches, split_token},
};

/// Issues and verifies stateless session tokens.
///
/// Verification needs only the signing key and the caller's clock reading; no
/// storage is consulted.
#[derive(Debug, Clone)]
pub struct SessionTokenService {
    engine: SignatureEngine,
}

impl SessionTokenService {
    /// Create a service signing with `key`.
    #[must_use]
    pub fn new(key: SigningKey) -> Self {
        Self {
            engine: SignatureEngine::new(key),
        }
    }

    /// Build a service from configuration, refusing to start without a usable key.
    ///
    /// # Errors
    ///
    /// Returns the resolution error when no key can be derived.
    pub fn try_from_config(config: &SessionSecretConfig) -> Result<Self, ConfigurationError> {
        config.resolve().map(Self::new)
    }

    /// Issue a token for `user` valid for `ttl` from `now`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionTokenError::InvalidTtl`] when `ttl` is under one second
    /// or overflows.
    pub fn issue(
        &self,
        user: SessionUser,
        ttl: Duration,
        now: Timestamp,
    ) -> Result<SessionToken, SessionTokenError> {
        let ttl_seconds =
            i64::try_from(ttl.as_secs()).map_err(|_overflow| SessionTokenError::InvalidTtl)?;

        if ttl_seconds <= 0 {
            return Err(SessionTokenError::InvalidTtl);
        }

        let issued_at = now.as_second();
        let expires_at = issued_at
            .checked_add(ttl_seconds)
            .ok_or(SessionTokenError::InvalidTtl)?;

        let user_id = user.id.clone();
        let payload = SessionTokenPayload::new(user, issued_at, expires_at);
        let token = encode_token(&self.engine, &payload)?;

        debug!(user_id, expires_at, "issued session token");

        Ok(SessionToken::new(token))
    }

    /// Verify `token` at `now`.
    ///
    /// Returns `None` for every failure: malformed input, bad signature, bad
    /// payload or expiry.
    #[must_use]
    pub fn verify(&self, token: &str, now: Timestamp) -> Option<VerifiedIdentity> {
        let segments = split_token(token)?;

        if !signature_matches(&self.engine, segments) {
            return None;
        }

        let payload = decode_payload(segments.payload)?;

        if !payload.is_live_at(now.as_second()) {
            return None;
        }

        Some(VerifiedIdentity::new(payload.into_user()))
    }

    /// Decode `token` without checking its signature.
    ///
    /// Expiry is still enforced against the claimed `expiresAt`. The result is
    /// a display hint only; see [`UnverifiedDisplayHint`].
    #[must_use]
    pub fn decode_unsafe(token: &str, now: Timestamp) -> Option<UnverifiedDisplayHint> {
        let segments = split_token(token)?;
        let payload = decode_payload(segments.payload)?;

        if !payload.is_live_at(now.as_second()) {
            return None;
        }

        Some(UnverifiedDisplayHint::new(payload.into_user()))
    }
}
