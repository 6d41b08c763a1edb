//! Storage contracts for OTP state.
//!
//! Each method is one round trip and each read-modify-write is atomic in the
//! backend, so concurrent requests across instances cannot both slip under a
//! limit or both consume the same code.

use std::time::Duration;

use async_trait::async_trait;
use jiff::Timestamp;
use mockall::automock;

use crate::otp::{
    AttemptOutcome, AttemptPolicy, Identifier, OtpRecord, RateLimitDecision, RateLimitPolicy,
    RateLimitRecord, StoreError,
};

/// Holds at most one code per identifier.
#[automock]
#[async_trait]
pub trait OtpStore: Send + Sync {
    /// Replace the identifier's record, expiring it from storage after `ttl`.
    async fn put(&self, record: OtpRecord, ttl: Duration) -> Result<(), StoreError>;

    /// Current record, if one is stored at `now`.
    async fn get(
        &self,
        identifier: &Identifier,
        now: Timestamp,
    ) -> Result<Option<OtpRecord>, StoreError>;

    /// Atomically check `supplied` against the record and update it.
    ///
    /// Mirrors [`AttemptOutcome`]: unknown, already verified, expired,
    /// locked out, wrong (attempts incremented) or verified (marked and given a
    /// grace TTL).
    async fn attempt(
        &self,
        identifier: &Identifier,
        supplied: &str,
        now: Timestamp,
        policy: AttemptPolicy,
    ) -> Result<AttemptOutcome, StoreError>;

    /// Drop the record.
    async fn remove(&self, identifier: &Identifier) -> Result<(), StoreError>;
}

/// Counts generation requests per identifier.
#[automock]
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    /// Atomically reset-if-stale, compare against the cap and record.
    async fn check_and_record(
        &self,
        identifier: &Identifier,
        now: Timestamp,
        policy: RateLimitPolicy,
    ) -> Result<RateLimitDecision, StoreError>;

    /// Current record, if any.
    async fn get(
        &self,
        identifier: &Identifier,
        now: Timestamp,
    ) -> Result<Option<RateLimitRecord>, StoreError>;
}
