//! Signing secret resolution.

use std::{fmt, str::FromStr};

use thiserror::Error;
use tracing::warn;

use crate::auth::signature::{MIN_SECRET_BYTES, SigningKey};

/// Environment variable holding the session signing secret.
pub const SESSION_SECRET_ENV: &str = "SESSION_SECRET";

/// Environment variable naming the deployment environment.
pub const DEPLOYMENT_ENVIRONMENT_ENV: &str = "DEPLOYMENT_ENVIRONMENT";

/// Fallback signing secret used outside production when none is configured.
///
/// Anyone can read this value. Tokens signed with it are forgeable.
pub const INSECURE_DEVELOPMENT_SECRET: &str =
    "INSECURE-DEVELOPMENT-ONLY-session-secret-never-use-in-production";

/// Where the service is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum DeploymentEnvironment {
    /// Local development or test.
    #[default]
    Development,

    /// Anything reachable by real users.
    Production,
}

impl DeploymentEnvironment {
    /// Whether this is a production deployment.
    #[must_use]
    pub const fn is_production(self) -> bool {
        matches!(self, Self::Production)
    }

    /// Read [`DEPLOYMENT_ENVIRONMENT_ENV`], defaulting to development when unset.
    ///
    /// # Errors
    ///
    /// Returns an error if the variable is set to an unknown value.
    pub fn from_env() -> Result<Self, ConfigurationError> {
        match std::env::var(DEPLOYMENT_ENVIRONMENT_ENV) {
            Ok(value) => value.parse(),
            Err(_unset) => Ok(Self::Development),
        }
    }
}

impl FromStr for DeploymentEnvironment {
    type Err = ConfigurationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" | "test" | "local" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            other => Err(ConfigurationError::UnknownEnvironment(other.to_string())),
        }
    }
}

impl fmt::Display for DeploymentEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Development => f.write_str("development"),
            Self::Production => f.write_str("production"),
        }
    }
}

/// Signing secret configuration errors. Always fatal.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("SESSION_SECRET is required in production")]
    MissingSecret,

    #[error("SESSION_SECRET must be at least {MIN_SECRET_BYTES} bytes in production")]
    WeakSecret,

    #[error("unknown deployment environment: {0}")]
    UnknownEnvironment(String),
}

/// Raw session secret settings, as read from configuration.
#[derive(Clone, Default)]
pub struct SessionSecretConfig {
    /// Configured secret, if any.
    pub secret: Option<String>,

    /// Deployment environment the secret is resolved for.
    pub environment: DeploymentEnvironment,
}

impl fmt::Debug for SessionSecretConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionSecretConfig")
            .field("secret", &self.secret.as_ref().map(|_secret| "**redacted**"))
            .field("environment", &self.environment)
            .finish()
    }
}

impl SessionSecretConfig {
    /// Read [`SESSION_SECRET_ENV`] and [`DEPLOYMENT_ENVIRONMENT_ENV`].
    ///
    /// # Errors
    ///
    /// Returns an error if the deployment environment is not recognised.
    pub fn from_env() -> Result<Self, ConfigurationError> {
        Ok(Self {
            secret: std::env::var(SESSION_SECRET_ENV)
                .ok()
                .filter(|secret| !secret.is_empty()),
            environment: DeploymentEnvironment::from_env()?,
        })
    }

    /// Turn the configuration into a signing key.
    ///
    /// Production requires an explicit secret of at least
    /// [`MIN_SECRET_BYTES`]. Elsewhere a missing secret falls back to
    /// [`INSECURE_DEVELOPMENT_SECRET`] and a warning is logged.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::MissingSecret`] or
    /// [`ConfigurationError::WeakSecret`] in production.
    pub fn resolve(&self) -> Result<SigningKey, ConfigurationError> {
        match (&self.secret, self.environment) {
            (Some(secret), DeploymentEnvironment::Production)
                if secret.len() < MIN_SECRET_BYTES =>
            {
                Err(ConfigurationError::WeakSecret)
            }
            (Some(secret), _) => Ok(SigningKey::from_bytes(secret.as_bytes().to_vec())),
            (None, DeploymentEnvironment::Production) => Err(ConfigurationError::MissingSecret),
            (None, DeploymentEnvironment::Development) => {
                warn!(
                    "no {SESSION_SECRET_ENV} configured; signing session tokens with the \
                     INSECURE development fallback secret. Never deploy this configuration."
                );

                Ok(SigningKey::from_bytes(
                    INSECURE_DEVELOPMENT_SECRET.as_bytes().to_vec(),
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn production_without_secret_fails_closed() {
        let config = SessionSecretConfig {
            secret: None,
            environment: DeploymentEnvironment::Production,
        };

        assert_eq!(config.resolve().err(), Some(ConfigurationError::MissingSecret));
    }

    #[test]
    fn production_rejects_short_secret() {
        let config = SessionSecretConfig {
            secret: Some("short".to_string()),
            environment: DeploymentEnvironment::Production,
        };

        assert_eq!(config.resolve().err(), Some(ConfigurationError::WeakSecret));
    }

    #[test]
    fn development_falls_back_to_labelled_secret() {
        let config = SessionSecretConfig::default();

        let key = config.resolve();

        assert_eq!(
            key.ok().map(|key| key.as_bytes().to_vec()),
            Some(INSECURE_DEVELOPMENT_SECRET.as_bytes().to_vec())
        );
    }

    #[test]
    fn configured_secret_is_used_verbatim() {
        let secret = "a".repeat(MIN_SECRET_BYTES);
        let config = SessionSecretConfig {
            secret: Some(secret.clone()),
            environment: DeploymentEnvironment::Production,
        };

        assert_eq!(
            config.resolve().ok().map(|key| key.as_bytes().to_vec()),
            Some(secret.into_bytes())
        );
    }

    #[test]
    fn environment_parses_common_spellings() {
        assert_eq!(
            "PROD".parse::<DeploymentEnvironment>(),
            Ok(DeploymentEnvironment::Production)
        );
        assert_eq!(
            "dev".parse::<DeploymentEnvironment>(),
            Ok(DeploymentEnvironment::Development)
        );
        assert!("staging".parse::<DeploymentEnvironment>().is_err());
    }

    #[test]
    fn debug_output_redacts_secret() {
        let config = SessionSecretConfig {
            secret: Some("hunter2".to_string()),
            environment: DeploymentEnvironment::Development,
        };

        assert!(!format!("{config:?}").contains("hunter2"));
    }
}
