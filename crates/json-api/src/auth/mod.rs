//! Session authentication

pub(crate) mod middleware;
pub(crate) mod session;
