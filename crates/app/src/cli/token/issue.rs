use std::time::Duration;

use clap::Args;
use jiff::Timestamp;
use tally_app::{
    auth::{Role, SessionUser},
    context::DEFAULT_SESSION_TTL,
};

use crate::cli::SessionArgs;

#[derive(Debug, Args)]
pub(crate) struct IssueTokenArgs {
    #[command(flatten)]
    session: SessionArgs,

    /// Stable user id
    #[arg(long)]
    id: String,

    /// User email address
    #[arg(long)]
    email: String,

    /// Display name
    #[arg(long)]
    name: String,

    /// Platform role
    #[arg(long, value_enum)]
    role: Role,

    /// Avatar URL
    #[arg(long)]
    avatar: Option<String>,

    /// Token lifetime in seconds
    #[arg(long, default_value_t = DEFAULT_SESSION_TTL.as_secs())]
    ttl_seconds: u64,
}

pub(crate) fn run(args: &IssueTokenArgs) -> Result<(), String> {
    let service = args.session.service()?;
    let now = Timestamp::now();

    let token = service
        .issue(
            SessionUser {
                id: args.id.clone(),
                email: args.email.clone(),
                name: args.name.clone(),
                role: args.role,
                avatar: args.avatar.clone(),
            },
            Duration::from_secs(args.ttl_seconds),
            now,
        )
        .map_err(|error| format!("failed to issue token: {error}"))?;

    let expires_at = i64::try_from(args.ttl_seconds)
        .ok()
        .and_then(|ttl| Timestamp::from_second(now.as_second().checked_add(ttl)?).ok());

    if let Some(expires_at) = expires_at {
        println!("expires_at: {expires_at}");
    }
    println!("session_token: {}", token.as_str());

    Ok(())
}
