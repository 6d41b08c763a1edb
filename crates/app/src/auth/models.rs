//! Session identity models.

use std::{fmt, ops::Deref};

use serde::{Deserialize, Serialize};

/// Platform role carried in a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Contestant,
    Media,
    Voter,
}

impl Role {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Contestant => "contestant",
            Self::Media => "media",
            Self::Voter => "voter",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity-bearing fields of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

/// Signed token body.
///
/// Timestamps are unix seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionTokenPayload {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    pub issued_at: i64,
    pub expires_at: i64,
}

impl SessionTokenPayload {
    pub(crate) fn new(user: SessionUser, issued_at: i64, expires_at: i64) -> Self {
        Self {
            id: user.id,
            email: user.email,
            name: user.name,
            role: user.role,
            avatar: user.avatar,
            issued_at,
            expires_at,
        }
    }

    /// Whether the payload is still valid at `now_seconds`.
    #[must_use]
    pub fn is_live_at(&self, now_seconds: i64) -> bool {
        self.expires_at > now_seconds
    }

    pub(crate) fn into_user(self) -> SessionUser {
        SessionUser {
            id: self.id,
            email: self.email,
            name: self.name,
            role: self.role,
            avatar: self.avatar,
        }
    }
}

/// Encoded session token, `payload.signature`.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken(String);

impl SessionToken {
    pub(crate) fn new(token: String) -> Self {
        Self(token)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken(**redacted**)")?;
        Ok(())
    }
}

/// Identity recovered from a token whose signature and expiry were checked.
///
/// Only [`SessionTokenService::verify`](crate::auth::SessionTokenService::verify)
/// constructs this type. Use it for authorization decisions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity(SessionUser);

impl VerifiedIdentity {
    pub(crate) fn new(user: SessionUser) -> Self {
        Self(user)
    }

    #[must_use]
    pub fn user(&self) -> &SessionUser {
        &self.0
    }

    #[must_use]
    pub fn into_user(self) -> SessionUser {
        self.0
    }
}

impl Deref for VerifiedIdentity {
    type Target = SessionUser;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Identity decoded *without* checking the signature.
///
/// Anyone can mint a token that decodes to any value here. Good for showing a
/// name or avatar before the real check completes, never for access control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnverifiedDisplayHint(SessionUser);

impl UnverifiedDisplayHint {
    pub(crate) fn new(user: SessionUser) -> Self {
        Self(user)
    }

    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.0.name
    }

    #[must_use]
    pub fn avatar(&self) -> Option<&str> {
        self.0.avatar.as_deref()
    }

    /// The claimed, unverified user.
    #[must_use]
    pub fn claimed_user(&self) -> &SessionUser {
        &self.0
    }
}
