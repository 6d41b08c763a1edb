//! One-time passcode login

pub(crate) mod errors;
pub(crate) mod handlers;
