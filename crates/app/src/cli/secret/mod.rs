use clap::{Args, Subcommand};

mod generate;

#[derive(Debug, Args)]
pub(crate) struct SecretCommand {
    #[command(subcommand)]
    command: SecretSubcommand,
}

#[derive(Debug, Subcommand)]
enum SecretSubcommand {
    Generate,
}

pub(crate) fn run(command: SecretCommand) -> Result<(), String> {
    match command.command {
        SecretSubcommand::Generate => {
            generate::run();
            Ok(())
        }
    }
}
