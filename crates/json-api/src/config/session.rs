//! Session Config

use std::time::Duration;

use clap::Args;
use tally_app::auth::{DeploymentEnvironment, SessionSecretConfig};

/// Session token settings.
#[derive(Debug, Args)]
pub struct SessionConfig {
    /// Secret used to sign session tokens
    #[arg(long, env = "SESSION_SECRET", hide_env_values = true)]
    pub session_secret: Option<String>,

    /// Deployment environment (development, production)
    #[arg(
        long,
        env = "DEPLOYMENT_ENVIRONMENT",
        value_enum,
        default_value_t = DeploymentEnvironment::Development
    )]
    pub deployment_environment: DeploymentEnvironment,

    /// Session token lifetime in seconds
    #[arg(long, env = "SESSION_TTL_SECONDS", default_value_t = 86_400_u64)]
    pub session_ttl_seconds: u64,
}

impl SessionConfig {
    #[must_use]
    pub fn secret_config(&self) -> SessionSecretConfig {
        SessionSecretConfig {
            secret: self
                .session_secret
                .clone()
                .filter(|secret| !secret.is_empty()),
            environment: self.deployment_environment,
        }
    }

    #[must_use]
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_seconds)
    }
}
