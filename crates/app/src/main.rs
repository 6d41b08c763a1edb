//! Tally Application CLI

use std::process::ExitCode;

use clap::Parser;

mod cli;

pub fn main() -> ExitCode {
    let _env = dotenvy::dotenv();

    match cli::Cli::parse().run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("{error}");
            ExitCode::FAILURE
        }
    }
}
