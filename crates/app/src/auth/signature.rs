//! HMAC-SHA256 signing for session token segments.

use std::fmt;

use hmac::{Hmac, Mac};
use rand::{RngCore, rngs::OsRng};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

type HmacSha256 = Hmac<Sha256>;

/// Length in bytes of an HMAC-SHA256 tag.
pub const SIGNATURE_BYTES: usize = 32;

/// Minimum accepted secret length for production deployments.
pub const MIN_SECRET_BYTES: usize = 32;

/// Number of random bytes produced by [`SigningKey::generate`].
pub const GENERATED_SECRET_BYTES: usize = 64;

/// Secret key material used to sign session tokens.
#[derive(Clone)]
pub struct SigningKey {
    bytes: Vec<u8>,
}

impl SigningKey {
    /// Wrap raw key bytes.
    #[must_use]
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    /// Generate a fresh random key.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = vec![0_u8; GENERATED_SECRET_BYTES];

        OsRng.fill_bytes(&mut bytes);

        Self { bytes }
    }

    /// Raw key bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Key length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the key is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SigningKey(**redacted**)")?;
        Ok(())
    }
}

impl Drop for SigningKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

/// Computes and checks HMAC-SHA256 signatures with a fixed key.
///
/// Holds no mutable state and can be shared freely across threads.
#[derive(Debug, Clone)]
pub struct SignatureEngine {
    key: SigningKey,
}

impl SignatureEngine {
    /// Create an engine bound to `key`.
    #[must_use]
    pub fn new(key: SigningKey) -> Self {
        Self { key }
    }

    /// HMAC-SHA256 of `message` under the engine's key.
    #[must_use]
    pub fn sign(&self, message: &[u8]) -> [u8; SIGNATURE_BYTES] {
        // HMAC accepts keys of any length, including empty ones.
        let Ok(mut mac) = HmacSha256::new_from_slice(self.key.as_bytes()) else {
            return [0_u8; SIGNATURE_BYTES];
        };

        mac.update(message);

        let mut tag = [0_u8; SIGNATURE_BYTES];
        tag.copy_from_slice(&mac.finalize().into_bytes());

        tag
    }

    /// Check `provided` against the signature of `message`.
    ///
    /// Both sides are hashed to a fixed-width digest before the constant-time
    /// comparison, so neither a length mismatch nor the position of the first
    /// differing byte changes how long the comparison takes.
    #[must_use]
    pub fn verify(&self, message: &[u8], provided: &[u8]) -> bool {
        let expected = self.sign(message);

        constant_time_eq(&expected, provided)
    }
}

/// Fixed-width constant-time equality over arbitrary-length inputs.
#[must_use]
pub fn constant_time_eq(left: &[u8], right: &[u8]) -> bool {
    let left_digest = Sha256::digest(left);
    let right_digest = Sha256::digest(right);

    left_digest.as_slice().ct_eq(right_digest.as_slice()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> SignatureEngine {
        SignatureEngine::new(SigningKey::from_bytes(b"test-secret-key".to_vec()))
    }

    #[test]
    fn sign_is_deterministic() {
        let engine = engine();

        assert_eq!(
            engine.sign(b"payload"),
            engine.sign(b"payload"),
            "same key and message must produce the same tag"
        );
    }

    #[test]
    fn sign_matches_rfc_4231_case_two() {
        let engine = SignatureEngine::new(SigningKey::from_bytes(b"Jefe".to_vec()));
        let tag = engine.sign(b"what do ya want for nothing?");

        let hex: String = tag.iter().map(|byte| format!("{byte:02x}")).collect();

        assert_eq!(
            hex,
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn verify_accepts_matching_signature() {
        let engine = engine();
        let tag = engine.sign(b"payload");

        assert!(engine.verify(b"payload", &tag));
    }

    #[test]
    fn verify_rejects_other_message_or_key() {
        let engine = engine();
        let tag = engine.sign(b"payload");
        let other = SignatureEngine::new(SigningKey::from_bytes(b"another-key".to_vec()));

        assert!(!engine.verify(b"payload2", &tag), "message change must fail");
        assert!(!other.verify(b"payload", &tag), "key change must fail");
    }

    #[test]
    fn verify_rejects_truncated_and_extended_signatures() {
        let engine = engine();
        let tag = engine.sign(b"payload");

        let mut extended = tag.to_vec();
        extended.push(0);

        assert!(!engine.verify(b"payload", tag.get(..16).unwrap_or_default()));
        assert!(!engine.verify(b"payload", &extended));
        assert!(!engine.verify(b"payload", &[]));
    }

    #[test]
    fn debug_output_redacts_key() {
        let key = SigningKey::from_bytes(b"super-secret".to_vec());

        assert_eq!(format!("{key:?}"), "SigningKey(**redacted**)");
    }

    #[test]
    fn generated_keys_are_long_and_distinct() {
        let first = SigningKey::generate();
        let second = SigningKey::generate();

        assert_eq!(first.len(), GENERATED_SECRET_BYTES);
        assert_ne!(first.as_bytes(), second.as_bytes(), "keys must be random");
    }
}
