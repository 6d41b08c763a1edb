//! OTP Handlers

pub(crate) mod remaining;
pub(crate) mod request;
pub(crate) mod resend;
pub(crate) mod verify;
