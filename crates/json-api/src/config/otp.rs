//! OTP Config

use std::time::Duration;

use clap::Args;
use tally_app::{
    context::OtpStoreBackend,
    otp::{OtpPolicy, RateLimitPolicy, WebhookConfig, redis::DEFAULT_KEY_PREFIX},
};

/// Backing store for OTP state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OtpStoreKind {
    /// Process-local maps.
    Memory,

    /// Shared Redis.
    Redis,
}

/// One-time passcode settings.
#[derive(Debug, Args)]
pub struct OtpConfig {
    /// OTP store backend (memory, redis)
    #[arg(long, env = "OTP_STORE", value_enum, default_value_t = OtpStoreKind::Memory)]
    pub otp_store: OtpStoreKind,

    /// Redis connection string
    #[arg(
        long,
        env = "REDIS_URL",
        hide_env_values = true,
        required_if_eq("otp_store", "redis")
    )]
    pub redis_url: Option<String>,

    /// Prefix for Redis keys
    #[arg(long, env = "REDIS_KEY_PREFIX", default_value = DEFAULT_KEY_PREFIX)]
    pub redis_key_prefix: String,

    /// Code lifetime in seconds
    #[arg(long, env = "OTP_LIFETIME_SECONDS", default_value_t = 600_u64)]
    pub otp_lifetime_seconds: u64,

    /// Wrong guesses allowed per code
    #[arg(long, env = "OTP_MAX_ATTEMPTS", default_value_t = 5_u32)]
    pub otp_max_attempts: u32,

    /// Codes that may be requested per cooldown window
    #[arg(long, env = "OTP_MAX_REQUESTS", default_value_t = 3_u32)]
    pub otp_max_requests: u32,

    /// Rate limit cooldown window in seconds
    #[arg(long, env = "OTP_COOLDOWN_SECONDS", default_value_t = 30_u64)]
    pub otp_cooldown_seconds: u64,

    /// How long a used code is remembered, in seconds
    #[arg(long, env = "OTP_VERIFIED_GRACE_SECONDS", default_value_t = 5_u64)]
    pub otp_verified_grace_seconds: u64,

    /// Endpoint that delivers codes by SMS or email
    #[arg(long, env = "OTP_DELIVERY_WEBHOOK_URL")]
    pub otp_delivery_webhook_url: Option<String>,

    /// Bearer token for the delivery endpoint
    #[arg(long, env = "OTP_DELIVERY_WEBHOOK_TOKEN", hide_env_values = true)]
    pub otp_delivery_webhook_token: Option<String>,
}

impl OtpConfig {
    #[must_use]
    pub fn store_backend(&self) -> OtpStoreBackend {
        match (self.otp_store, &self.redis_url) {
            (OtpStoreKind::Redis, Some(url)) => OtpStoreBackend::Redis {
                url: url.clone(),
                key_prefix: self.redis_key_prefix.clone(),
            },
            _ => OtpStoreBackend::Memory,
        }
    }

    #[must_use]
    pub fn policy(&self) -> OtpPolicy {
        OtpPolicy {
            lifetime: Duration::from_secs(self.otp_lifetime_seconds),
            max_attempts: self.otp_max_attempts,
            verified_grace: Duration::from_secs(self.otp_verified_grace_seconds),
            rate_limit: RateLimitPolicy {
                max_requests_per_window: self.otp_max_requests,
                cooldown_window: Duration::from_secs(self.otp_cooldown_seconds),
            },
            ..OtpPolicy::default()
        }
    }

    #[must_use]
    pub fn webhook(&self) -> Option<WebhookConfig> {
        self.otp_delivery_webhook_url
            .as_ref()
            .map(|url| WebhookConfig {
                url: url.clone(),
                token: self.otp_delivery_webhook_token.clone(),
            })
    }
}
