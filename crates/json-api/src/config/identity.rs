//! Identity Config

use std::path::PathBuf;

use clap::Args;

/// User directory settings.
#[derive(Debug, Args)]
pub struct IdentityConfig {
    /// JSON file listing the users allowed to sign in
    #[arg(long, env = "IDENTITY_FILE")]
    pub identity_file: Option<PathBuf>,
}
