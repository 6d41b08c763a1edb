//! Request IDs.

use salvo::{
    http::{StatusCode, header::HeaderValue},
    prelude::Response,
};
use tracing::warn;
use uuid::Uuid;

pub(super) const REQUEST_ID_HEADER: &str = "x-request-id";

/// Longest client-supplied request id that is trusted.
const MAX_REQUEST_ID_LEN: usize = 128;

/// Keep a sane client-supplied id, otherwise mint a UUIDv7.
pub(super) fn resolve_request_id(header_value: Option<String>) -> String {
    header_value
        .map(|value| value.trim().to_owned())
        .filter(|value| is_acceptable(value))
        .unwrap_or_else(|| Uuid::now_v7().to_string())
}

fn is_acceptable(value: &str) -> bool {
    !value.is_empty()
        && value.len() <= MAX_REQUEST_ID_LEN
        && value
            .bytes()
            .all(|byte| byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b'.'))
}

pub(super) fn set_request_id_header(res: &mut Response, request_id: &str) {
    match HeaderValue::from_str(request_id) {
        Ok(value) => {
            res.headers_mut().insert(REQUEST_ID_HEADER, value);
        }
        Err(source) => warn!(request_id, "could not encode request id header: {source}"),
    }
}

pub(super) fn response_status_or_ok(status_code: Option<StatusCode>) -> StatusCode {
    status_code.unwrap_or(StatusCode::OK)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_ids_are_kept_when_sane() {
        assert_eq!(
            resolve_request_id(Some(" abc-123 ".to_string())),
            "abc-123"
        );
    }

    #[test]
    fn test_unsafe_client_ids_are_replaced() {
        let replaced = resolve_request_id(Some("evil\nvalue".to_string()));

        assert_ne!(replaced, "evil\nvalue");
        assert_eq!(replaced.len(), 36);
        assert_eq!(resolve_request_id(Some("x".repeat(200))).len(), 36);
    }
}
