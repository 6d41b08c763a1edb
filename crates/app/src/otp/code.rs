//! One-time passcode values.

use std::fmt;

use rand::{Rng, rngs::OsRng};
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

/// Number of digits in a code.
pub const OTP_CODE_DIGITS: usize = 6;

const OTP_CODE_MIN: u32 = 100_000;
const OTP_CODE_MAX: u32 = 999_999;

/// A six digit numeric code.
///
/// `Debug` is redacted and there is no `Display`, so a code cannot end up in a
/// log line by accident. Use [`OtpCode::expose`] at the delivery boundary.
#[derive(Clone, PartialEq, Eq)]
pub struct OtpCode(String);

impl OtpCode {
    /// Draw a code uniformly from `100000..=999999` using the OS RNG.
    #[must_use]
    pub fn generate() -> Self {
        let value = OsRng.gen_range(OTP_CODE_MIN..=OTP_CODE_MAX);

        Self(value.to_string())
    }

    /// Parse a stored or supplied code. Returns `None` unless it is exactly six ASCII digits.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        if value.len() == OTP_CODE_DIGITS && value.bytes().all(|byte| byte.is_ascii_digit()) {
            Some(Self(value.to_string()))
        } else {
            None
        }
    }

    /// The digits, for hand-off to a delivery channel.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Constant-time comparison against user input.
    #[must_use]
    pub fn matches(&self, supplied: &str) -> bool {
        self.0.as_bytes().ct_eq(supplied.as_bytes()).into()
    }
}

impl fmt::Debug for OtpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("OtpCode(**redacted**)")?;
        Ok(())
    }
}

impl Drop for OtpCode {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}
