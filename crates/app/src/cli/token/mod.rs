use clap::{Args, Subcommand};

mod inspect;
mod issue;

#[derive(Debug, Args)]
pub(crate) struct TokenCommand {
    #[command(subcommand)]
    command: TokenSubcommand,
}

#[derive(Debug, Subcommand)]
enum TokenSubcommand {
    Issue(issue::IssueTokenArgs),
    Inspect(inspect::InspectTokenArgs),
}

pub(crate) fn run(command: TokenCommand) -> Result<(), String> {
    match command.command {
        TokenSubcommand::Issue(args) => issue::run(&args),
        TokenSubcommand::Inspect(args) => inspect::run(&args),
    }
}
