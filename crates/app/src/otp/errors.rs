//! OTP errors.

use std::time::Duration;

use thiserror::Error;

/// Verification and generation outcomes reported to the identifier's owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum OtpError {
    /// No active code. Also what an expired-and-purged code looks like.
    #[error("no active code for this identifier")]
    NotFound,

    #[error("code has already been used")]
    AlreadyUsed,

    #[error("code has expired")]
    Expired,

    #[error("too many incorrect attempts")]
    AttemptsExceeded,

    #[error("code does not match")]
    Mismatch,

    #[error("too many code requests, retry in {}s", wait.as_secs())]
    RateLimitExceeded { wait: Duration },
}

impl OtpError {
    /// Stable machine-readable code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::NotFound => "otp_not_found",
            Self::AlreadyUsed => "otp_already_used",
            Self::Expired => "otp_expired",
            Self::AttemptsExceeded => "otp_attempts_exceeded",
            Self::Mismatch => "otp_mismatch",
            Self::RateLimitExceeded { .. } => "rate_limit_exceeded",
        }
    }
}

/// Backend storage failures.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store backend error")]
    Backend(#[source] redis::RedisError),

    #[error("stored record is corrupt: {0}")]
    Corrupt(String),

    #[error("in-memory store lock poisoned")]
    Poisoned,
}

impl From<redis::RedisError> for StoreError {
    fn from(error: redis::RedisError) -> Self {
        Self::Backend(error)
    }
}

/// Delivery channel failures.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("delivery rejected: {0}")]
    Rejected(String),

    #[error("failed to write code: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors returned by [`OtpService`](crate::otp::OtpService).
#[derive(Debug, Error)]
pub enum OtpServiceError {
    #[error(transparent)]
    Otp(#[from] OtpError),

    #[error("identifier must not be empty")]
    InvalidIdentifier,

    #[error("otp storage error")]
    Store(#[from] StoreError),

    #[error("otp delivery failed")]
    Delivery(#[from] DeliveryError),
}

impl OtpServiceError {
    /// The owner-facing outcome, if this is one.
    #[must_use]
    pub fn as_otp(&self) -> Option<OtpError> {
        match self {
            Self::Otp(error) => Some(*error),
            _ => None,
        }
    }
}
