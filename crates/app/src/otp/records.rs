//! OTP and rate limit records and policies.

use std::{fmt, time::Duration};

use jiff::Timestamp;

use crate::{
    clock::{duration_millis, millis_duration},
    otp::{OtpCode, OtpServiceError},
};

/// Normalised OTP subject: an email address or phone number.
///
/// Surrounding whitespace is trimmed and ASCII letters are lowercased, so
/// `" A@B.com"` and `"a@b.com"` share one record and one rate limit bucket.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identifier(String);

impl Identifier {
    /// Normalise raw input.
    ///
    /// # Errors
    ///
    /// Returns [`OtpServiceError::InvalidIdentifier`] when nothing is left after trimming.
    pub fn parse(raw: &str) -> Result<Self, OtpServiceError> {
        let normalised = raw.trim().to_ascii_lowercase();

        if normalised.is_empty() {
            return Err(OtpServiceError::InvalidIdentifier);
        }

        Ok(Self(normalised))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The active code for one identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtpRecord {
    pub identifier: Identifier,
    pub code: OtpCode,
    pub created_at: Timestamp,
    pub expires_at: Timestamp,
    pub attempts: u32,
    pub verified: bool,
}

impl OtpRecord {
    /// A fresh, unverified record living for `lifetime` from `now`.
    #[must_use]
    pub fn issue(identifier: Identifier, code: OtpCode, now: Timestamp, lifetime: Duration) -> Self {
        let expires_at = Timestamp::from_millisecond(
            now.as_millisecond().saturating_add(duration_millis(lifetime)),
        )
        .unwrap_or(Timestamp::MAX);

        Self {
            identifier,
            code,
            created_at: now,
            expires_at,
            attempts: 0,
            verified: false,
        }
    }

    /// Time left before expiry, zero once expired.
    #[must_use]
    pub fn remaining_at(&self, now: Timestamp) -> Duration {
        millis_duration(self.expires_at.as_millisecond() - now.as_millisecond())
    }

    /// Whether `now` is past the expiry instant.
    #[must_use]
    pub fn is_expired_at(&self, now: Timestamp) -> bool {
        now > self.expires_at
    }
}

/// Generation history for one identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitRecord {
    pub identifier: Identifier,
    pub last_request_time: Timestamp,
    pub request_count: u32,
}

impl RateLimitRecord {
    /// Time since the last recorded request.
    #[must_use]
    pub fn elapsed_ms(&self, now: Timestamp) -> i64 {
        now.as_millisecond() - self.last_request_time.as_millisecond()
    }
}

/// Limits applied to OTP generation per identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    /// Generations allowed before throttling.
    pub max_requests_per_window: u32,

    /// Quiet period after the last request that resets the count.
    pub cooldown_window: Duration,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            max_requests_per_window: 3,
            cooldown_window: Duration::from_secs(30),
        }
    }
}

impl RateLimitPolicy {
    pub(crate) fn cooldown_ms(&self) -> i64 {
        duration_millis(self.cooldown_window)
    }

    /// Apply the policy to an existing record at `now`.
    ///
    /// This is the reference rule every store backend reproduces atomically:
    /// reset when the window elapsed, throttle at the cap, otherwise count.
    #[must_use]
    pub fn evaluate(&self, previous: Option<&RateLimitRecord>, now: Timestamp) -> RateLimitDecision {
        let cooldown = self.cooldown_ms();

        let count = match previous {
            Some(record) if record.elapsed_ms(now) <= cooldown => record.request_count,
            _ => 0,
        };

        if count >= self.max_requests_per_window {
            let elapsed = previous.map_or(0, |record| record.elapsed_ms(now));

            return RateLimitDecision::Throttled {
                wait: millis_duration((cooldown - elapsed).max(1)),
            };
        }

        RateLimitDecision::Allowed {
            request_count: count + 1,
        }
    }
}

/// Outcome of an atomic rate limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    /// The request was counted; `request_count` includes it.
    Allowed { request_count: u32 },

    /// Over the limit; nothing was recorded.
    Throttled { wait: Duration },
}

/// Lifetime and attempt settings for codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OtpPolicy {
    /// How long a code is accepted after generation.
    pub lifetime: Duration,

    /// Wrong guesses tolerated before lockout.
    pub max_attempts: u32,

    /// How long a verified record lingers so duplicate checks read "already used".
    pub verified_grace: Duration,

    /// How long an expired record is retained so verification can report expiry.
    pub expired_retention: Duration,

    /// Generation throttling.
    pub rate_limit: RateLimitPolicy,
}

impl Default for OtpPolicy {
    fn default() -> Self {
        Self {
            lifetime: Duration::from_secs(600),
            max_attempts: 5,
            verified_grace: Duration::from_secs(5),
            expired_retention: Duration::from_secs(600),
            rate_limit: RateLimitPolicy::default(),
        }
    }
}

impl OtpPolicy {
    /// Storage TTL for a freshly issued record.
    #[must_use]
    pub fn record_ttl(&self) -> Duration {
        self.lifetime.saturating_add(self.expired_retention)
    }

    /// Settings the store needs for an atomic verification attempt.
    #[must_use]
    pub fn attempt_policy(&self) -> AttemptPolicy {
        AttemptPolicy {
            max_attempts: self.max_attempts,
            verified_grace: self.verified_grace,
        }
    }
}

/// Settings for one atomic verification attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttemptPolicy {
    pub max_attempts: u32,
    pub verified_grace: Duration,
}

/// Result of one atomic verification attempt against the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    NotFound,
    AlreadyUsed,
    Expired,
    AttemptsExceeded,
    Mismatch { attempts: u32 },
    Verified,
}

impl AttemptOutcome {
    /// Apply one attempt to `record` in place.
    ///
    /// Returns the outcome and whether the record must now be deleted. Store
    /// backends call this (or mirror it server side) under their own atomicity.
    pub(crate) fn apply(
        record: &mut OtpRecord,
        supplied: &str,
        now: Timestamp,
        policy: AttemptPolicy,
    ) -> (Self, RecordFate) {
        if record.verified {
            return (Self::AlreadyUsed, RecordFate::Keep);
        }

        if record.is_expired_at(now) {
            return (Self::Expired, RecordFate::Delete);
        }

        if record.attempts >= policy.max_attempts {
            return (Self::AttemptsExceeded, RecordFate::Delete);
        }

        if !record.code.matches(supplied) {
            record.attempts += 1;

            return (
                Self::Mismatch {
                    attempts: record.attempts,
                },
                RecordFate::Keep,
            );
        }

        record.verified = true;

        (Self::Verified, RecordFate::ExpireAfter(policy.verified_grace))
    }
}

/// What a store does with a record after an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RecordFate {
    Keep,
    Delete,
    ExpireAfter(Duration),
}
