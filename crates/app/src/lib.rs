//! Authentication core: signed session tokens and rate-limited one-time passcodes.

pub mod auth;
pub mod clock;
pub mod context;
pub mod identity;
pub mod otp;

#[cfg(test)]
mod test;
