//! App Context

use std::{path::PathBuf, sync::Arc, time::Duration};

use thiserror::Error;
use tracing::{info, warn};

use crate::{
    auth::{ConfigurationError, SessionSecretConfig, SessionTokenService},
    clock::{Clock, SystemClock},
    identity::{IdentityError, IdentityStore, InMemoryIdentityStore},
    otp::{
        ConsoleDelivery, InMemoryOtpStore, InMemoryRateLimitStore, OtpDelivery, OtpPolicy,
        OtpService, OtpStore, RateLimitStore, StoreError, StoreOtpService,
        WebhookConfig, WebhookDelivery,
        redis::{self, RedisOtpStore, RedisRateLimitStore},
    },
};

/// Default session lifetime.
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(86_400);

#[derive(Debug, Error)]
pub enum AppInitError {
    #[error("invalid session configuration")]
    Configuration(#[from] ConfigurationError),

    #[error("failed to connect to the otp store")]
    Store(#[from] StoreError),

    #[error("failed to load identities")]
    Identity(#[from] IdentityError),

    #[error("an otp delivery webhook is required in production")]
    MissingDelivery,
}

/// Where OTP and rate limit state lives.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum OtpStoreBackend {
    /// Process-local maps. Single instance only.
    #[default]
    Memory,

    /// Shared Redis, for multi-instance deployments.
    Redis { url: String, key_prefix: String },
}

/// Everything needed to build an [`AppContext`].
#[derive(Debug, Clone, Default)]
pub struct AppSettings {
    pub session: SessionSecretConfig,
    pub session_ttl: Option<Duration>,
    pub otp_store: OtpStoreBackend,
    pub otp_policy: OtpPolicy,
    pub delivery: Option<WebhookConfig>,
    pub identity_file: Option<PathBuf>,
}

#[derive(Clone)]
pub struct AppContext {
    pub sessions: SessionTokenService,
    pub session_ttl: Duration,
    pub otp: Arc<dyn OtpService>,
    pub identities: Arc<dyn IdentityStore>,
    pub clock: Arc<dyn Clock>,
}

impl AppContext {
    /// Build application context from settings.
    ///
    /// # Errors
    ///
    /// Returns an error when the session secret cannot be resolved, the OTP
    /// store is unreachable, the identity file is unusable, or production
    /// runs without a delivery webhook.
    pub async fn from_settings(settings: AppSettings) -> Result<Self, AppInitError> {
        let sessions = SessionTokenService::try_from_config(&settings.session)?;
        let production = settings.session.environment.is_production();

        let (otps, rate_limits): (Arc<dyn OtpStore>, Arc<dyn RateLimitStore>) =
            match &settings.otp_store {
                OtpStoreBackend::Memory => {
                    info!("using in-memory otp store");

                    (
                        Arc::new(InMemoryOtpStore::new()),
                        Arc::new(InMemoryRateLimitStore::new()),
                    )
                }
                OtpStoreBackend::Redis { url, key_prefix } => {
                    let connection = redis::connect(url).await?;

                    info!(%key_prefix, "using redis otp store");

                    (
                        Arc::new(RedisOtpStore::new(connection.clone(), key_prefix.clone())),
                        Arc::new(RedisRateLimitStore::new(connection, key_prefix.clone())),
                    )
                }
            };

        let delivery: Arc<dyn OtpDelivery> = match settings.delivery {
            Some(config) => Arc::new(WebhookDelivery::new(config)),
            None if production => return Err(AppInitError::MissingDelivery),
            None => {
                warn!(
                    "no otp delivery webhook configured; printing codes to stderr. \
                     INSECURE, development only"
                );

                Arc::new(ConsoleDelivery::stderr())
            }
        };

        let identities = match &settings.identity_file {
            Some(path) => InMemoryIdentityStore::from_json_file(path)?,
            None => {
                warn!("no identity file configured, every otp login will be rejected");

                InMemoryIdentityStore::default()
            }
        };

        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        Ok(Self {
            sessions,
            session_ttl: settings.session_ttl.unwrap_or(DEFAULT_SESSION_TTL),
            otp: Arc::new(StoreOtpService::new(
                otps,
                rate_limits,
                delivery,
                clock.clone(),
                settings.otp_policy,
            )),
            identities: Arc::new(identities),
            clock,
        })
    }
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use super::*;
    use crate::auth::DeploymentEnvironment;

    fn production() -> AppSettings {
        AppSettings {
            session: SessionSecretConfig {
                secret: Some("a".repeat(48)),
                environment: DeploymentEnvironment::Production,
            },
            ..AppSettings::default()
        }
    }

    #[tokio::test]
    async fn development_defaults_build() -> TestResult {
        let ctx = AppContext::from_settings(AppSettings::default()).await?;
        let token = ctx.sessions.issue(
            crate::auth::SessionUser {
                id: "u1".to_string(),
                email: "a@b.com".to_string(),
                name: "A".to_string(),
                role: crate::auth::Role::Voter,
                avatar: None,
            },
            ctx.session_ttl,
            ctx.clock.now(),
        )?;

        assert!(ctx.sessions.verify(token.as_str(), ctx.clock.now()).is_some());
        assert_eq!(ctx.session_ttl, DEFAULT_SESSION_TTL);

        Ok(())
    }

    #[tokio::test]
    async fn development_delivers_codes_without_a_webhook() -> TestResult {
        let ctx = AppContext::from_settings(AppSettings::default()).await?;

        let challenge = ctx.otp.generate("dev@example.com").await?;

        assert_eq!(challenge.expires_in, OtpPolicy::default().lifetime);
        assert!(ctx.otp.remaining_time("dev@example.com").await? > Duration::ZERO);

        Ok(())
    }

    #[tokio::test]
    async fn production_requires_a_secret() {
        let mut settings = production();
        settings.session.secret = None;

        assert!(matches!(
            AppContext::from_settings(settings).await,
            Err(AppInitError::Configuration(ConfigurationError::MissingSecret))
        ));
    }

    #[tokio::test]
    async fn production_requires_delivery() {
        assert!(matches!(
            AppContext::from_settings(production()).await,
            Err(AppInitError::MissingDelivery)
        ));
    }

    #[tokio::test]
    async fn production_with_webhook_builds() -> TestResult {
        let mut settings = production();
        settings.delivery = Some(WebhookConfig {
            url: "https://sms.example.com/send".to_string(),
            token: None,
        });

        AppContext::from_settings(settings).await?;

        Ok(())
    }
}
