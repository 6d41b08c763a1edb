//! Session token wire format.
//!
//! `base64url(json(payload)) "." base64url(hmac_sha256(secret, encoded_payload))`,
//! both segments unpadded.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};

use crate::auth::{
    SessionTokenError, SessionTokenPayload, signature::SignatureEngine,
};

/// Separator between the payload and signature segments.
pub const SEGMENT_SEPARATOR: char = '.';

/// Token split into its two raw segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TokenSegments<'a> {
    pub payload: &'a str,
    pub signature: &'a str,
}

/// Encode `payload` and sign it.
pub(crate) fn encode_token(
    engine: &SignatureEngine,
    payload: &SessionTokenPayload,
) -> Result<String, SessionTokenError> {
    let json = serde_json::to_vec(payload)?;
    let encoded_payload = URL_SAFE_NO_PAD.encode(json);
    let signature = engine.sign(encoded_payload.as_bytes());

    Ok(format!(
        "{encoded_payload}{SEGMENT_SEPARATOR}{}",
        URL_SAFE_NO_PAD.encode(signature)
    ))
}

/// Split a token into exactly two non-empty segments.
pub(crate) fn split_token(token: &str) -> Option<TokenSegments<'_>> {
    let (payload, signature) = token.split_once(SEGMENT_SEPARATOR)?;

    if payload.is_empty() || signature.is_empty() || signature.contains(SEGMENT_SEPARATOR) {
        return None;
    }

    Some(TokenSegments { payload, signature })
}

/// Check the signature segment against the payload segment.
pub(crate) fn signature_matches(engine: &SignatureEngine, segments: TokenSegments<'_>) -> bool {
    // An undecodable signature is still compared, as an empty tag, so every
    // rejection goes through the same constant-time path.
    let provided = URL_SAFE_NO_PAD
        .decode(segments.signature)
        .unwrap_or_default();

    engine.verify(segments.payload.as_bytes(), &provided)
}

/// Decode the payload segment without looking at the signature.
pub(crate) fn decode_payload(segment: &str) -> Option<SessionTokenPayload> {
    let bytes = URL_SAFE_NO_PAD.decode(segment).ok()?;

    serde_json::from_slice(&bytes).ok()
}
