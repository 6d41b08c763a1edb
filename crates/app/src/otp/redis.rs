//! # Redis
//!
//! Shared store for multi-instance deployments.
//!
//! ## Layout
//!
//! ```text
//! {prefix}:otp:{identifier}   hash: code, created_at_ms, expires_at_ms, attempts, verified
//! {prefix}:rate:{identifier}  hash: last_request_ms, request_count
//! ```
//!
//! Every read-modify-write runs as a Lua script. Redis executes a script as
//! one unit, so two instances racing on the same identifier see each other's
//! writes in order.

use std::{collections::HashMap, time::Duration};

use async_trait::async_trait;
use jiff::Timestamp;
use redis::{AsyncCommands, Client, Script, aio::ConnectionManager};

use crate::{
    clock::duration_millis,
    otp::{
        AttemptOutcome, AttemptPolicy, Identifier, OtpCode, OtpRecord, OtpStore,
        RateLimitDecision, RateLimitPolicy, RateLimitRecord, RateLimitStore, StoreError,
    },
};

/// Default key prefix.
pub const DEFAULT_KEY_PREFIX: &str = "tally";

const RATE_LIMIT_RETENTION_MS: i64 = 1_000;

/// Mirrors [`RateLimitPolicy::evaluate`].
const CHECK_AND_RECORD: &str = r"
local now = tonumber(ARGV[1])
local cooldown = tonumber(ARGV[2])
local max = tonumber(ARGV[3])
local retention = tonumber(ARGV[4])

local last = tonumber(redis.call('HGET', KEYS[1], 'last_request_ms'))
local count = tonumber(redis.call('HGET', KEYS[1], 'request_count')) or 0

if last == nil or now - last > cooldown then
  count = 0
end

if count >= max then
  local wait = cooldown
  if last ~= nil then
    wait = cooldown - (now - last)
  end
  if wait < 1 then
    wait = 1
  end
  return {0, wait}
end

count = count + 1
redis.call('HSET', KEYS[1], 'last_request_ms', now, 'request_count', count)
redis.call('PEXPIRE', KEYS[1], cooldown + retention)

return {1, count}
";

/// Mirrors `AttemptOutcome::apply`.
///
/// The code comparison visits every stored byte and folds differences with
/// `bit.bor`, so its running time does not depend on where a guess diverges.
const ATTEMPT: &str = r"
if redis.call('EXISTS', KEYS[1]) == 0 then
  return {'not_found', 0}
end

local fields = redis.call('HMGET', KEYS[1], 'code', 'expires_at_ms', 'attempts', 'verified')
local now = tonumber(ARGV[1])
local max = tonumber(ARGV[3])

if fields[4] == '1' then
  return {'already_used', 0}
end

if now > tonumber(fields[2]) then
  redis.call('DEL', KEYS[1])
  return {'expired', 0}
end

local attempts = tonumber(fields[3])

if attempts >= max then
  redis.call('DEL', KEYS[1])
  return {'attempts_exceeded', attempts}
end

local stored = fields[1]
local supplied = ARGV[2]
local diff = 0

if #stored ~= #supplied then
  diff = 1
end

for i = 1, #stored do
  diff = bit.bor(diff, bit.bxor(string.byte(stored, i), string.byte(supplied, i) or 0))
end

if diff ~= 0 then
  attempts = redis.call('HINCRBY', KEYS[1], 'attempts', 1)
  return {'mismatch', attempts}
end

redis.call('HSET', KEYS[1], 'verified', '1')
redis.call('PEXPIRE', KEYS[1], tonumber(ARGV[4]))

return {'verified', 0}
";

/// Open a reconnecting connection to `redis_url`.
///
/// # Errors
///
/// Returns an error if the URL is invalid or the first connection fails.
pub async fn connect(redis_url: &str) -> Result<ConnectionManager, StoreError> {
    let client = Client::open(redis_url)?;

    Ok(client.get_connection_manager().await?)
}

#[derive(Clone)]
struct Keys {
    prefix: String,
}

impl Keys {
    fn otp(&self, identifier: &Identifier) -> String {
        format!("{}:otp:{}", self.prefix, identifier.as_str())
    }

    fn rate(&self, identifier: &Identifier) -> String {
        format!("{}:rate:{}", self.prefix, identifier.as_str())
    }
}

/// Redis-backed [`OtpStore`].
#[derive(Clone)]
pub struct RedisOtpStore {
    connection: ConnectionManager,
    keys: Keys,
    attempt: Script,
}

impl std::fmt::Debug for RedisOtpStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisOtpStore")
            .field("prefix", &self.keys.prefix)
            .finish_non_exhaustive()
    }
}

impl RedisOtpStore {
    #[must_use]
    pub fn new(connection: ConnectionManager, prefix: impl Into<String>) -> Self {
        Self {
            connection,
            keys: Keys {
                prefix: prefix.into(),
            },
            attempt: Script::new(ATTEMPT),
        }
    }
}

#[async_trait]
impl OtpStore for RedisOtpStore {
    async fn put(&self, record: OtpRecord, ttl: Duration) -> Result<(), StoreError> {
        let key = self.keys.otp(&record.identifier);
        let mut connection = self.connection.clone();

        let fields = [
            ("code", record.code.expose().to_string()),
            ("created_at_ms", record.created_at.as_millisecond().to_string()),
            ("expires_at_ms", record.expires_at.as_millisecond().to_string()),
            ("attempts", record.attempts.to_string()),
            ("verified", if record.verified { "1" } else { "0" }.to_string()),
        ];

        let () = redis::pipe()
            .atomic()
            .del(&key)
            .ignore()
            .hset_multiple(&key, &fields)
            .ignore()
            .pexpire(&key, duration_millis(ttl))
            .ignore()
            .query_async(&mut connection)
            .await?;

        Ok(())
    }

    async fn get(
        &self,
        identifier: &Identifier,
        _now: Timestamp,
    ) -> Result<Option<OtpRecord>, StoreError> {
        let mut connection = self.connection.clone();

        let fields: HashMap<String, String> = connection.hgetall(self.keys.otp(identifier)).await?;

        if fields.is_empty() {
            return Ok(None);
        }

        decode_otp_record(identifier, &fields).map(Some)
    }

    async fn attempt(
        &self,
        identifier: &Identifier,
        supplied: &str,
        now: Timestamp,
        policy: AttemptPolicy,
    ) -> Result<AttemptOutcome, StoreError> {
        let mut connection = self.connection.clone();

        let (outcome, attempts): (String, i64) = self
            .attempt
            .key(self.keys.otp(identifier))
            .arg(now.as_millisecond())
            .arg(supplied)
            .arg(policy.max_attempts)
            .arg(duration_millis(policy.verified_grace).max(1))
            .invoke_async(&mut connection)
            .await?;

        match outcome.as_str() {
            "not_found" => Ok(AttemptOutcome::NotFound),
            "already_used" => Ok(AttemptOutcome::AlreadyUsed),
            "expired" => Ok(AttemptOutcome::Expired),
            "attempts_exceeded" => Ok(AttemptOutcome::AttemptsExceeded),
            "mismatch" => Ok(AttemptOutcome::Mismatch {
                attempts: u32::try_from(attempts).unwrap_or(u32::MAX),
            }),
            "verified" => Ok(AttemptOutcome::Verified),
            other => Err(StoreError::Corrupt(format!("unknown attempt outcome {other}"))),
        }
    }

    async fn remove(&self, identifier: &Identifier) -> Result<(), StoreError> {
        let mut connection = self.connection.clone();

        let _removed: i64 = connection.del(self.keys.otp(identifier)).await?;

        Ok(())
    }
}

fn decode_otp_record(
    identifier: &Identifier,
    fields: &HashMap<String, String>,
) -> Result<OtpRecord, StoreError> {
    let field = |name: &str| {
        fields
            .get(name)
            .ok_or_else(|| StoreError::Corrupt(format!("missing field {name}")))
    };

    let millis = |name: &str| -> Result<Timestamp, StoreError> {
        let raw = field(name)?
            .parse::<i64>()
            .map_err(|error| StoreError::Corrupt(format!("{name}: {error}")))?;

        Timestamp::from_millisecond(raw)
            .map_err(|error| StoreError::Corrupt(format!("{name}: {error}")))
    };

    let code = OtpCode::parse(field("code")?)
        .ok_or_else(|| StoreError::Corrupt("code is not six digits".to_string()))?;

    let attempts = field("attempts")?
        .parse::<u32>()
        .map_err(|error| StoreError::Corrupt(format!("attempts: {error}")))?;

    Ok(OtpRecord {
        identifier: identifier.clone(),
        code,
        created_at: millis("created_at_ms")?,
        expires_at: millis("expires_at_ms")?,
        attempts,
        verified: field("verified")? == "1",
    })
}

/// Redis-backed [`RateLimitStore`].
#[derive(Clone)]
pub struct RedisRateLimitStore {
    connection: ConnectionManager,
    keys: Keys,
    check_and_record: Script,
}

impl std::fmt::Debug for RedisRateLimitStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisRateLimitStore")
            .field("prefix", &self.keys.prefix)
            .finish_non_exhaustive()
    }
}

impl RedisRateLimitStore {
    #[must_use]
    pub fn new(connection: ConnectionManager, prefix: impl Into<String>) -> Self {
        Self {
            connection,
            keys: Keys {
                prefix: prefix.into(),
            },
            check_and_record: Script::new(CHECK_AND_RECORD),
        }
    }
}

#[async_trait]
impl RateLimitStore for RedisRateLimitStore {
    async fn check_and_record(
        &self,
        identifier: &Identifier,
        now: Timestamp,
        policy: RateLimitPolicy,
    ) -> Result<RateLimitDecision, StoreError> {
        let mut connection = self.connection.clone();

        let (allowed, value): (i64, i64) = self
            .check_and_record
            .key(self.keys.rate(identifier))
            .arg(now.as_millisecond())
            .arg(policy.cooldown_ms())
            .arg(policy.max_requests_per_window)
            .arg(RATE_LIMIT_RETENTION_MS)
            .invoke_async(&mut connection)
            .await?;

        if allowed == 1 {
            Ok(RateLimitDecision::Allowed {
                request_count: u32::try_from(value).unwrap_or(u32::MAX),
            })
        } else {
            Ok(RateLimitDecision::Throttled {
                wait: Duration::from_millis(u64::try_from(value).unwrap_or(1)),
            })
        }
    }

    async fn get(
        &self,
        identifier: &Identifier,
        _now: Timestamp,
    ) -> Result<Option<RateLimitRecord>, StoreError> {
        let mut connection = self.connection.clone();

        let (last, count): (Option<i64>, Option<u32>) = redis::cmd("HMGET")
            .arg(self.keys.rate(identifier))
            .arg("last_request_ms")
            .arg("request_count")
            .query_async(&mut connection)
            .await?;

        let (Some(last), Some(count)) = (last, count) else {
            return Ok(None);
        };

        let last_request_time = Timestamp::from_millisecond(last)
            .map_err(|error| StoreError::Corrupt(format!("last_request_ms: {error}")))?;

        Ok(Some(RateLimitRecord {
            identifier: identifier.clone(),
            last_request_time,
            request_count: count,
        }))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use testresult::TestResult;

    use super::*;
    use crate::{otp::OtpPolicy, test::redis_connection};

    fn unique_prefix(test: &str) -> String {
        format!("tally-test:{test}:{}", Timestamp::now().as_nanosecond())
    }

    fn t0() -> Result<Timestamp, jiff::Error> {
        "2026-05-01T09:00:00Z".parse()
    }

    fn plus(start: Timestamp, seconds: i64) -> Result<Timestamp, jiff::Error> {
        Timestamp::from_second(start.as_second() + seconds)
    }

    async fn otp_store_with_code(
        test: &str,
        identifier: &Identifier,
        code: &str,
    ) -> TestResult<RedisOtpStore> {
        let store = RedisOtpStore::new(redis_connection().await?, unique_prefix(test));
        let policy = OtpPolicy::default();

        store
            .put(
                OtpRecord::issue(
                    identifier.clone(),
                    OtpCode::parse(code).ok_or("code")?,
                    t0()?,
                    policy.lifetime,
                ),
                policy.record_ttl(),
            )
            .await?;

        Ok(store)
    }

    #[test]
    fn decode_rejects_missing_fields() -> TestResult {
        let id = Identifier::parse("x@y.com")?;
        let fields = HashMap::from([("code".to_string(), "123456".to_string())]);

        assert!(matches!(
            decode_otp_record(&id, &fields),
            Err(StoreError::Corrupt(_))
        ));

        Ok(())
    }

    #[tokio::test]
    async fn put_then_get_round_trips_the_record() -> TestResult {
        let id = Identifier::parse("x@y.com")?;
        let store = otp_store_with_code("get", &id, "123456").await?;

        let stored = store.get(&id, t0()?).await?.ok_or("record should exist")?;

        assert!(stored.code.matches("123456"));
        assert_eq!(stored.created_at, t0()?);
        assert_eq!(stored.attempts, 0);
        assert!(!stored.verified);

        Ok(())
    }

    #[tokio::test]
    async fn attempt_script_follows_the_state_machine() -> TestResult {
        let id = Identifier::parse("x@y.com")?;
        let store = otp_store_with_code("attempt", &id, "123456").await?;
        let t0 = t0()?;
        let attempt = OtpPolicy::default().attempt_policy();

        assert_eq!(
            store.attempt(&id, "000000", t0, attempt).await?,
            AttemptOutcome::Mismatch { attempts: 1 }
        );
        assert_eq!(
            store.attempt(&id, "123456", t0, attempt).await?,
            AttemptOutcome::Verified
        );
        assert_eq!(
            store.attempt(&id, "123456", t0, attempt).await?,
            AttemptOutcome::AlreadyUsed
        );

        let stored = store.get(&id, t0).await?.ok_or("record should linger")?;

        assert!(stored.verified);

        store.remove(&id).await?;

        assert_eq!(
            store.attempt(&id, "123456", t0, attempt).await?,
            AttemptOutcome::NotFound
        );

        Ok(())
    }

    #[tokio::test]
    async fn attempt_script_compares_whole_codes() -> TestResult {
        let id = Identifier::parse("x@y.com")?;
        let store = otp_store_with_code("compare", &id, "123456").await?;
        let t0 = t0()?;
        let attempt = OtpPolicy::default().attempt_policy();

        for (guess, attempts) in [("12345", 1), ("1234567", 2), ("123450", 3), ("", 4)] {
            assert_eq!(
                store.attempt(&id, guess, t0, attempt).await?,
                AttemptOutcome::Mismatch { attempts },
                "{guess:?} must not match"
            );
        }

        assert_eq!(
            store.attempt(&id, "123456", t0, attempt).await?,
            AttemptOutcome::Verified
        );

        Ok(())
    }

    #[tokio::test]
    async fn attempt_script_expires_and_locks_out() -> TestResult {
        let id = Identifier::parse("x@y.com")?;
        let t0 = t0()?;
        let attempt = OtpPolicy::default().attempt_policy();

        let expiring = otp_store_with_code("expire", &id, "123456").await?;

        assert_eq!(
            expiring.attempt(&id, "123456", plus(t0, 601)?, attempt).await?,
            AttemptOutcome::Expired
        );
        assert_eq!(
            expiring.attempt(&id, "123456", plus(t0, 601)?, attempt).await?,
            AttemptOutcome::NotFound
        );

        let locking = otp_store_with_code("lockout", &id, "123456").await?;

        for _ in 0..5 {
            locking.attempt(&id, "000000", t0, attempt).await?;
        }

        assert_eq!(
            locking.attempt(&id, "123456", t0, attempt).await?,
            AttemptOutcome::AttemptsExceeded
        );

        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_attempts_never_exceed_the_cap() -> TestResult {
        let id = Identifier::parse("x@y.com")?;
        let store = Arc::new(otp_store_with_code("concurrent-attempts", &id, "123456").await?);
        let t0 = t0()?;
        let attempt = OtpPolicy::default().attempt_policy();

        let mut handles = Vec::new();

        for _ in 0..32 {
            let store = Arc::clone(&store);
            let id = id.clone();

            handles.push(tokio::spawn(async move {
                store.attempt(&id, "000000", t0, attempt).await
            }));
        }

        let mut mismatches = 0;

        for handle in handles {
            if let AttemptOutcome::Mismatch { .. } = handle.await?? {
                mismatches += 1;
            }
        }

        assert_eq!(mismatches, 5, "only max_attempts wrong guesses may be counted");

        Ok(())
    }

    #[tokio::test]
    async fn rate_script_counts_throttles_and_resets() -> TestResult {
        let store = RedisRateLimitStore::new(redis_connection().await?, unique_prefix("rate"));
        let id = Identifier::parse("x@y.com")?;
        let t0 = t0()?;
        let policy = RateLimitPolicy::default();

        for expected in 1..=3 {
            assert_eq!(
                store.check_and_record(&id, t0, policy).await?,
                RateLimitDecision::Allowed {
                    request_count: expected
                }
            );
        }

        assert_eq!(
            store.check_and_record(&id, plus(t0, 10)?, policy).await?,
            RateLimitDecision::Throttled {
                wait: Duration::from_secs(20)
            }
        );
        assert_eq!(
            store.check_and_record(&id, plus(t0, 30)?, policy).await?,
            RateLimitDecision::Throttled {
                wait: Duration::from_millis(1)
            },
            "the window resets only after the cooldown has fully elapsed"
        );
        assert_eq!(
            store.check_and_record(&id, plus(t0, 31)?, policy).await?,
            RateLimitDecision::Allowed { request_count: 1 }
        );

        let record = store.get(&id, plus(t0, 31)?).await?.ok_or("record")?;

        assert_eq!(record.request_count, 1);
        assert_eq!(record.last_request_time, plus(t0, 31)?);

        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_generations_respect_the_limit() -> TestResult {
        let store = Arc::new(RedisRateLimitStore::new(
            redis_connection().await?,
            unique_prefix("concurrent-rate"),
        ));
        let id = Identifier::parse("x@y.com")?;
        let t0 = t0()?;
        let policy = RateLimitPolicy::default();

        let mut handles = Vec::new();

        for _ in 0..16 {
            let store = Arc::clone(&store);
            let id = id.clone();

            handles.push(tokio::spawn(async move {
                store.check_and_record(&id, t0, policy).await
            }));
        }

        let mut allowed = 0;

        for handle in handles {
            if let RateLimitDecision::Allowed { .. } = handle.await?? {
                allowed += 1;
            }
        }

        assert_eq!(allowed, 3, "exactly max_requests_per_window may pass");

        Ok(())
    }
}
