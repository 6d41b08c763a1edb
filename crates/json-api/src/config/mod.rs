//! Server configuration module

use clap::Parser;
use tally_app::context::AppSettings;

use crate::config::{
    identity::IdentityConfig, observability::LoggingConfig, otp::OtpConfig,
    server::ServerRuntimeConfig, session::SessionConfig,
};

pub(crate) mod identity;
pub(crate) mod observability;
pub(crate) mod otp;
pub(crate) mod server;
pub(crate) mod session;

/// Tally JSON API Server configuration
#[derive(Debug, Parser)]
#[command(name = "tally-json", about = "Tally JSON API Server", long_about = None)]
pub struct ServerConfig {
    /// Server network settings.
    #[command(flatten)]
    pub server: ServerRuntimeConfig,

    /// Logging output settings.
    #[command(flatten)]
    pub logging: LoggingConfig,

    /// Session token settings.
    #[command(flatten)]
    pub session: SessionConfig,

    /// One-time passcode settings.
    #[command(flatten)]
    pub otp: OtpConfig,

    /// User directory settings.
    #[command(flatten)]
    pub identity: IdentityConfig,
}

impl ServerConfig {
    /// Load configuration from environment and CLI arguments
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be parsed
    pub fn load() -> Result<Self, clap::Error> {
        // Load .env file if present (ignore if missing)
        _ = dotenvy::dotenv();

        Self::try_parse()
    }

    /// Get the socket address for binding
    #[must_use]
    pub fn socket_addr(&self) -> String {
        self.server.socket_addr()
    }

    /// Settings for building the application context.
    #[must_use]
    pub fn app_settings(&self) -> AppSettings {
        AppSettings {
            session: self.session.secret_config(),
            session_ttl: Some(self.session.ttl()),
            otp_store: self.otp.store_backend(),
            otp_policy: self.otp.policy(),
            delivery: self.otp.webhook(),
            identity_file: self.identity.identity_file.clone(),
        }
    }
}
