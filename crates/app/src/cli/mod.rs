use clap::{Args, Parser, Subcommand};
use tally_app::auth::{DeploymentEnvironment, SessionSecretConfig, SessionTokenService};

mod secret;
mod token;

#[derive(Debug, Parser)]
#[command(name = "tally-app", about = "Tally auth CLI", long_about = None)]
pub(crate) struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    Token(token::TokenCommand),
    Secret(secret::SecretCommand),
}

impl Cli {
    pub(crate) fn run(self) -> Result<(), String> {
        match self.command {
            Commands::Token(command) => token::run(command),
            Commands::Secret(command) => secret::run(command),
        }
    }
}

/// Signing secret settings shared by token commands.
#[derive(Debug, Args)]
pub(crate) struct SessionArgs {
    /// Session signing secret
    #[arg(long, env = "SESSION_SECRET", hide_env_values = true)]
    session_secret: Option<String>,

    /// Deployment environment the secret is resolved for
    #[arg(
        long,
        env = "DEPLOYMENT_ENVIRONMENT",
        value_enum,
        default_value_t = DeploymentEnvironment::Development
    )]
    environment: DeploymentEnvironment,
}

impl SessionArgs {
    pub(crate) fn service(&self) -> Result<SessionTokenService, String> {
        SessionTokenService::try_from_config(&SessionSecretConfig {
            secret: self
                .session_secret
                .clone()
                .filter(|secret| !secret.is_empty()),
            environment: self.environment,
        })
        .map_err(|error| format!("invalid session configuration: {error}"))
    }
}
