//! OTP service.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use mockall::automock;
use tracing::{debug, error, info, warn};

use crate::{
    clock::{Clock, millis_duration},
    otp::{
        AttemptOutcome, Identifier, OtpCode, OtpDelivery, OtpError, OtpPolicy, OtpRecord,
        OtpServiceError, OtpStore, RateLimitDecision, RateLimitStore,
    },
};

/// A code was generated and handed to the delivery channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OtpChallenge {
    /// Remaining lifetime of the delivered code.
    pub expires_in: Duration,
}

/// Whether a "resend code" action is available yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResendStatus {
    pub allowed: bool,
    pub wait: Duration,
}

#[automock]
#[async_trait]
pub trait OtpService: Send + Sync {
    /// Generate and deliver a new code, replacing any outstanding one.
    async fn generate(&self, identifier: &str) -> Result<OtpChallenge, OtpServiceError>;

    /// Check a supplied code. Succeeds at most once per generated code.
    async fn verify(&self, identifier: &str, code: &str) -> Result<(), OtpServiceError>;

    /// Whether the cooldown since the last generation has elapsed.
    async fn can_resend(&self, identifier: &str) -> Result<ResendStatus, OtpServiceError>;

    /// Time left on the active code, zero when there is none.
    async fn remaining_time(&self, identifier: &str) -> Result<Duration, OtpServiceError>;

    /// Invalidate any outstanding code.
    async fn clear(&self, identifier: &str) -> Result<(), OtpServiceError>;
}

/// [`OtpService`] over pluggable stores.
#[derive(Clone)]
pub struct StoreOtpService {
    otps: Arc<dyn OtpStore>,
    rate_limits: Arc<dyn RateLimitStore>,
    delivery: Arc<dyn OtpDelivery>,
    clock: Arc<dyn Clock>,
    policy: OtpPolicy,
}

impl std::fmt::Debug for StoreOtpService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreOtpService")
            .field("clock", &self.clock)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl StoreOtpService {
    #[must_use]
    pub fn new(
        otps: Arc<dyn OtpStore>,
        rate_limits: Arc<dyn RateLimitStore>,
        delivery: Arc<dyn OtpDelivery>,
        clock: Arc<dyn Clock>,
        policy: OtpPolicy,
    ) -> Self {
        Self {
            otps,
            rate_limits,
            delivery,
            clock,
            policy,
        }
    }
}

#[async_trait]
impl OtpService for StoreOtpService {
    async fn generate(&self, identifier: &str) -> Result<OtpChallenge, OtpServiceError> {
        let identifier = Identifier::parse(identifier)?;
        let now = self.clock.now();

        let decision = self
            .rate_limits
            .check_and_record(&identifier, now, self.policy.rate_limit)
            .await?;

        if let RateLimitDecision::Throttled { wait } = decision {
            warn!(
                %identifier,
                wait_ms = wait.as_millis(),
                "otp generation throttled"
            );

            return Err(OtpError::RateLimitExceeded { wait }.into());
        }

        let code = OtpCode::generate();
        let record = OtpRecord::issue(identifier.clone(), code.clone(), now, self.policy.lifetime);

        self.otps.put(record, self.policy.record_ttl()).await?;

        if let Err(source) = self.delivery.deliver(&identifier, &code).await {
            error!(%identifier, "otp delivery failed: {source}");

            self.otps.remove(&identifier).await?;

            return Err(source.into());
        }

        info!(%identifier, "otp issued");

        Ok(OtpChallenge {
            expires_in: self.policy.lifetime,
        })
    }

    async fn verify(&self, identifier: &str, code: &str) -> Result<(), OtpServiceError> {
        let identifier = Identifier::parse(identifier)?;
        let now = self.clock.now();

        let outcome = self
            .otps
            .attempt(&identifier, code, now, self.policy.attempt_policy())
            .await?;

        let error = match outcome {
            AttemptOutcome::Verified => {
                info!(%identifier, "otp verified");

                return Ok(());
            }
            AttemptOutcome::NotFound => OtpError::NotFound,
            AttemptOutcome::AlreadyUsed => OtpError::AlreadyUsed,
            AttemptOutcome::Expired => OtpError::Expired,
            AttemptOutcome::AttemptsExceeded => OtpError::AttemptsExceeded,
            AttemptOutcome::Mismatch { attempts } => {
                debug!(%identifier, attempts, "otp mismatch");

                OtpError::Mismatch
            }
        };

        debug!(%identifier, error = error.code(), "otp verification rejected");

        Err(error.into())
    }

    async fn can_resend(&self, identifier: &str) -> Result<ResendStatus, OtpServiceError> {
        let identifier = Identifier::parse(identifier)?;
        let now = self.clock.now();

        let Some(record) = self.rate_limits.get(&identifier, now).await? else {
            return Ok(ResendStatus {
                allowed: true,
                wait: Duration::ZERO,
            });
        };

        // The window only resets once strictly more than the cooldown has passed.
        let remaining = self.policy.rate_limit.cooldown_ms() - record.elapsed_ms(now);

        if remaining < 0 {
            return Ok(ResendStatus {
                allowed: true,
                wait: Duration::ZERO,
            });
        }

        Ok(ResendStatus {
            allowed: false,
            wait: millis_duration(remaining.max(1)),
        })
    }

    async fn remaining_time(&self, identifier: &str) -> Result<Duration, OtpServiceError> {
        let identifier = Identifier::parse(identifier)?;
        let now = self.clock.now();

        let remaining = self
            .otps
            .get(&identifier, now)
            .await?
            .filter(|record| !record.verified)
            .map_or(Duration::ZERO, |record| record.remaining_at(now));

        Ok(remaining)
    }

    async fn clear(&self, identifier: &str) -> Result<(), OtpServiceError> {
        let identifier = Identifier::parse(identifier)?;

        self.otps.remove(&identifier).await?;

        debug!(%identifier, "otp cleared");

        Ok(())
    }
}
