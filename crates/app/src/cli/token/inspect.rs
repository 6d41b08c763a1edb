use clap::Args;
use jiff::Timestamp;
use tally_app::auth::{SessionTokenService, SessionUser};

use crate::cli::SessionArgs;

#[derive(Debug, Args)]
pub(crate) struct InspectTokenArgs {
    #[command(flatten)]
    session: SessionArgs,

    /// Session token to inspect
    token: String,
}

pub(crate) fn run(args: &InspectTokenArgs) -> Result<(), String> {
    let service = args.session.service()?;
    let now = Timestamp::now();

    match service.verify(&args.token, now) {
        Some(identity) => {
            println!("verified: yes");
            print_user(identity.user());
        }
        None => println!("verified: invalid"),
    }

    println!();

    match SessionTokenService::decode_unsafe(&args.token, now) {
        Some(hint) => {
            println!("unverified display hint:");
            print_user(hint.claimed_user());
        }
        None => println!("unverified display hint: none"),
    }

    Ok(())
}

fn print_user(user: &SessionUser) {
    println!("id: {}", user.id);
    println!("email: {}", user.email);
    println!("name: {}", user.name);
    println!("role: {}", user.role);
    if let Some(avatar) = &user.avatar {
        println!("avatar: {avatar}");
    }
}
