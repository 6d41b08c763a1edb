//! Process-local stores.
//!
//! Correct for a single instance and for tests. Multi-instance deployments
//! need the Redis backend, since nothing here is shared between processes.

use std::{
    sync::{Mutex, MutexGuard},
    time::Duration,
};

use async_trait::async_trait;
use jiff::Timestamp;
use rustc_hash::FxHashMap;

use crate::{
    clock::duration_millis,
    otp::{
        AttemptOutcome, AttemptPolicy, Identifier, OtpRecord, OtpStore, RateLimitDecision,
        RateLimitPolicy, RateLimitRecord, RateLimitStore, RecordFate, StoreError,
    },
};

/// Entries beyond this count trigger a sweep of expired ones on write.
const SWEEP_THRESHOLD: usize = 1_024;

/// Extra retention after the cooldown so resend checks still see the last request.
const RATE_LIMIT_RETENTION: Duration = Duration::from_secs(1);

#[derive(Debug)]
struct Entry<T> {
    value: T,
    evict_at_ms: i64,
}

impl<T> Entry<T> {
    fn new(value: T, now: Timestamp, ttl: Duration) -> Self {
        Self {
            value,
            evict_at_ms: deadline(now, ttl),
        }
    }

    fn is_live(&self, now: Timestamp) -> bool {
        now.as_millisecond() < self.evict_at_ms
    }
}

fn deadline(now: Timestamp, ttl: Duration) -> i64 {
    now.as_millisecond().saturating_add(duration_millis(ttl))
}

#[derive(Debug)]
struct TtlMap<T> {
    entries: Mutex<FxHashMap<Identifier, Entry<T>>>,
}

impl<T> Default for TtlMap<T> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(FxHashMap::default()),
        }
    }
}

impl<T> TtlMap<T> {
    fn lock(&self) -> Result<MutexGuard<'_, FxHashMap<Identifier, Entry<T>>>, StoreError> {
        self.entries.lock().map_err(|_poisoned| StoreError::Poisoned)
    }

    fn len(&self) -> Result<usize, StoreError> {
        Ok(self.lock()?.len())
    }
}

fn sweep<T>(entries: &mut FxHashMap<Identifier, Entry<T>>, now: Timestamp) {
    if entries.len() > SWEEP_THRESHOLD {
        entries.retain(|_, entry| entry.is_live(now));
    }
}

fn evict_if_stale<T>(
    entries: &mut FxHashMap<Identifier, Entry<T>>,
    identifier: &Identifier,
    now: Timestamp,
) {
    if entries
        .get(identifier)
        .is_some_and(|entry| !entry.is_live(now))
    {
        entries.remove(identifier);
    }
}

/// In-memory [`OtpStore`].
#[derive(Debug, Default)]
pub struct InMemoryOtpStore {
    records: TtlMap<OtpRecord>,
}

impl InMemoryOtpStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored entries, including ones not yet swept.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn len(&self) -> Result<usize, StoreError> {
        self.records.len()
    }

    /// Whether nothing is stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }
}

#[async_trait]
impl OtpStore for InMemoryOtpStore {
    async fn put(&self, record: OtpRecord, ttl: Duration) -> Result<(), StoreError> {
        let now = record.created_at;
        let mut entries = self.records.lock()?;

        sweep(&mut entries, now);
        entries.insert(record.identifier.clone(), Entry::new(record, now, ttl));

        Ok(())
    }

    async fn get(
        &self,
        identifier: &Identifier,
        now: Timestamp,
    ) -> Result<Option<OtpRecord>, StoreError> {
        let mut entries = self.records.lock()?;

        evict_if_stale(&mut entries, identifier, now);

        Ok(entries.get(identifier).map(|entry| entry.value.clone()))
    }

    async fn attempt(
        &self,
        identifier: &Identifier,
        supplied: &str,
        now: Timestamp,
        policy: AttemptPolicy,
    ) -> Result<AttemptOutcome, StoreError> {
        let mut entries = self.records.lock()?;

        evict_if_stale(&mut entries, identifier, now);

        let Some(entry) = entries.get_mut(identifier) else {
            return Ok(AttemptOutcome::NotFound);
        };

        let (outcome, fate) = AttemptOutcome::apply(&mut entry.value, supplied, now, policy);

        match fate {
            RecordFate::Keep => {}
            RecordFate::Delete => {
                entries.remove(identifier);
            }
            RecordFate::ExpireAfter(grace) => entry.evict_at_ms = deadline(now, grace),
        }

        Ok(outcome)
    }

    async fn remove(&self, identifier: &Identifier) -> Result<(), StoreError> {
        self.records.lock()?.remove(identifier);

        Ok(())
    }
}

/// In-memory [`RateLimitStore`].
#[derive(Debug, Default)]
pub struct InMemoryRateLimitStore {
    records: TtlMap<RateLimitRecord>,
}

impl InMemoryRateLimitStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RateLimitStore for InMemoryRateLimitStore {
    async fn check_and_record(
        &self,
        identifier: &Identifier,
        now: Timestamp,
        policy: RateLimitPolicy,
    ) -> Result<RateLimitDecision, StoreError> {
        let mut entries = self.records.lock()?;

        sweep(&mut entries, now);

        let previous = entries
            .get(identifier)
            .filter(|entry| entry.is_live(now))
            .map(|entry| &entry.value);

        let decision = policy.evaluate(previous, now);

        if let RateLimitDecision::Allowed { request_count } = decision {
            let record = RateLimitRecord {
                identifier: identifier.clone(),
                last_request_time: now,
                request_count,
            };
            let ttl = policy.cooldown_window.saturating_add(RATE_LIMIT_RETENTION);

            entries.insert(identifier.clone(), Entry::new(record, now, ttl));
        }

        Ok(decision)
    }

    async fn get(
        &self,
        identifier: &Identifier,
        now: Timestamp,
    ) -> Result<Option<RateLimitRecord>, StoreError> {
        let entries = self.records.lock()?;

        Ok(entries
            .get(identifier)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value.clone()))
    }
}
